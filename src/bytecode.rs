//! Bytecode representation and the compiler that produces it

use std::fmt;
use tracing::{debug, trace};

use crate::{
    lexer::TokenStream,
    token::{Location, Token, TokenKind},
    vm::Vm,
};

/// Offset of a NUL terminated string inside the data segment
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct DataOffset(pub usize);

/// Supported instructions of the bytecode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    /// Push an integer
    Int(i32),
    /// Push a float
    Float(f32),
    /// Push a reference to a string in the data segment
    Str(DataOffset),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    AddF,
    SubF,
    MulF,
    DivF,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `[a] -> [a, a]`
    Dup,
    /// `[a, b] -> [a, b, a]`
    Over,
    /// `[a, b] -> [b, a]`
    Swap,
    /// `[a] -> []`
    Drop,
    /// `[a, b, c] -> [b, c, a]`
    Rot,
    /// Pop a value and print it
    Dump,
    /// Stop the program
    Done,
}

impl Instruction {
    /// Words the instruction takes up in the program: the opcode plus the
    /// inline operand of literals.
    pub fn words(&self) -> usize {
        match self {
            Instruction::Int(_) | Instruction::Float(_) | Instruction::Str(_) => 2,
            _ => 1,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Int(_) => "int",
            Instruction::Float(_) => "float",
            Instruction::Str(_) => "str",
            Instruction::Add => "+",
            Instruction::Sub => "-",
            Instruction::Mul => "*",
            Instruction::Div => "/",
            Instruction::Mod => "%",
            Instruction::AddF => "+.",
            Instruction::SubF => "-.",
            Instruction::MulF => "*.",
            Instruction::DivF => "/.",
            Instruction::Eq => "=",
            Instruction::Neq => "!=",
            Instruction::Lt => "<",
            Instruction::Le => "<=",
            Instruction::Gt => ">",
            Instruction::Ge => ">=",
            Instruction::Dup => "dup",
            Instruction::Over => "over",
            Instruction::Swap => "swap",
            Instruction::Drop => "drop",
            Instruction::Rot => "rot",
            Instruction::Dump => ".",
            Instruction::Done => "done",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Int(n) => write!(f, "int({})", n),
            Instruction::Float(x) => write!(f, "float({})", x),
            Instruction::Str(offset) => write!(f, "str(@{})", offset.0),
            other => f.write_str(other.mnemonic()),
        }
    }
}

/// Bounded sequence of instructions
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    words: usize,
    capacity: usize,
}

impl Program {
    /// * `capacity` maximum size of the program in words
    pub fn new(capacity: usize) -> Self {
        Program {
            instructions: Vec::new(),
            words: 0,
            capacity,
        }
    }

    pub fn push(&mut self, instruction: Instruction) -> Result<(), CompileError> {
        let words = self.words + instruction.words();
        if words > self.capacity {
            return Err(CompileError::ProgramOverflow {
                capacity: self.capacity,
            });
        }

        self.instructions.push(instruction);
        self.words = words;
        Ok(())
    }

    pub fn get(&self, ip: usize) -> Option<Instruction> {
        self.instructions.get(ip).copied()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Size in words, operands included
    pub fn words(&self) -> usize {
        self.words
    }
}

/// Disassembly on a single line, eg. `int(1) int(2) + . done`
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(empty)");
        }

        for (i, instruction) in self.instructions.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", instruction)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("program does not fit into {capacity} words")]
    ProgramOverflow { capacity: usize },
    #[error("string data does not fit into {capacity} bytes")]
    DataOverflow { capacity: usize },
    #[error("{loc}: invalid {kind} literal '{text}'")]
    InvalidLiteral {
        loc: Location,
        kind: &'static str,
        text: String,
    },
    #[error("{loc}: unknown word '{word}'")]
    UnknownWord { loc: Location, word: String },
    #[error("token stream ended before end of input")]
    UnexpectedEnd,
}

/// Translates tokens into the program and data segment of a VM
pub struct Compiler<'vm> {
    vm: &'vm mut Vm,
}

impl<'vm> Compiler<'vm> {
    pub fn new(vm: &'vm mut Vm) -> Self {
        Compiler { vm }
    }

    /// Drain `tokens` up to `Eof`, emitting one instruction per token and a
    /// final `Done`.
    pub fn compile(mut self, mut tokens: TokenStream<'_, '_>) -> Result<(), CompileError> {
        loop {
            let token = tokens.next_token().ok_or(CompileError::UnexpectedEnd)?;
            if token.kind == TokenKind::Eof {
                break;
            }

            let instruction = self.translate(token)?;
            trace!(loc = %token.loc, %instruction, "emit");
            self.vm.program.push(instruction)?;
        }

        self.vm.program.push(Instruction::Done)?;
        debug!(
            instructions = self.vm.program.len(),
            words = self.vm.program.words(),
            data = self.vm.data.len(),
            "compiled program"
        );
        Ok(())
    }

    fn translate(&mut self, token: &Token<'_>) -> Result<Instruction, CompileError> {
        let instruction = match token.kind {
            TokenKind::Int => Instruction::Int(parse_literal(token, "int")?),
            TokenKind::Float => {
                let x: f32 = parse_literal(token, "float")?;
                if !x.is_finite() {
                    return Err(invalid_literal(token, "float"));
                }
                Instruction::Float(x)
            }
            TokenKind::Str => {
                let offset = self.vm.data.append(token.text.as_str().as_bytes()).ok_or(
                    CompileError::DataOverflow {
                        capacity: self.vm.data.capacity(),
                    },
                )?;
                Instruction::Str(offset)
            }
            TokenKind::Plus => Instruction::Add,
            TokenKind::Minus => Instruction::Sub,
            TokenKind::Star => Instruction::Mul,
            TokenKind::Slash => Instruction::Div,
            TokenKind::Percent => Instruction::Mod,
            TokenKind::PlusF => Instruction::AddF,
            TokenKind::MinusF => Instruction::SubF,
            TokenKind::StarF => Instruction::MulF,
            TokenKind::SlashF => Instruction::DivF,
            TokenKind::Eq => Instruction::Eq,
            TokenKind::Neq => Instruction::Neq,
            TokenKind::Lt => Instruction::Lt,
            TokenKind::Le => Instruction::Le,
            TokenKind::Gt => Instruction::Gt,
            TokenKind::Ge => Instruction::Ge,
            TokenKind::Dup => Instruction::Dup,
            TokenKind::Over => Instruction::Over,
            TokenKind::Swap => Instruction::Swap,
            TokenKind::Drop => Instruction::Drop,
            TokenKind::Rot => Instruction::Rot,
            TokenKind::Dot => Instruction::Dump,
            TokenKind::Eof => unreachable!("compile stops at the first eof"),
            TokenKind::Ident => {
                return Err(CompileError::UnknownWord {
                    loc: token.loc,
                    word: token.text.to_string(),
                })
            }
        };

        Ok(instruction)
    }
}

fn parse_literal<T: std::str::FromStr>(
    token: &Token<'_>,
    kind: &'static str,
) -> Result<T, CompileError> {
    token
        .text
        .as_str()
        .parse()
        .map_err(|_| invalid_literal(token, kind))
}

fn invalid_literal(token: &Token<'_>, kind: &'static str) -> CompileError {
    CompileError::InvalidLiteral {
        loc: token.loc,
        kind,
        text: token.text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arena::Arena,
        lexer::tokenize,
        token::SourceId,
        vm::VmConfig,
    };

    fn compile_with(program: &str, config: VmConfig) -> Result<Vm, CompileError> {
        let mut tokens = Arena::new(8);
        tokenize(program, SourceId(0), &mut tokens).unwrap();

        let mut vm = Vm::new(config);
        Compiler::new(&mut vm).compile(TokenStream::new(&tokens))?;
        Ok(vm)
    }

    fn compile(program: &str) -> Vm {
        compile_with(program, VmConfig::default()).unwrap()
    }

    #[test]
    fn one_instruction_per_token() {
        let vm = compile("-1 2 * 3 +\n.");
        assert_eq!(
            vm.program().instructions(),
            &[
                Instruction::Int(-1),
                Instruction::Int(2),
                Instruction::Mul,
                Instruction::Int(3),
                Instruction::Add,
                Instruction::Dump,
                Instruction::Done,
            ]
        );
        // three literals carry an operand word each
        assert_eq!(vm.program().words(), 10);
    }

    #[test]
    fn strings_go_to_data_segment() {
        let vm = compile("\"ab\" \"\" \"xyz\"");
        assert_eq!(
            vm.program().instructions(),
            &[
                Instruction::Str(DataOffset(0)),
                Instruction::Str(DataOffset(3)),
                Instruction::Str(DataOffset(4)),
                Instruction::Done,
            ]
        );
        assert_eq!(vm.data().get(DataOffset(0)), Some(&b"ab"[..]));
        assert_eq!(vm.data().get(DataOffset(3)), Some(&b""[..]));
        assert_eq!(vm.data().get(DataOffset(4)), Some(&b"xyz"[..]));
        assert_eq!(vm.data().len(), 8);
    }

    #[test]
    fn floats_and_words() {
        let vm = compile("1.5 2.5 +. dup over swap drop rot . %");
        assert_eq!(vm.program().get(0), Some(Instruction::Float(1.5)));
        assert_eq!(vm.program().get(2), Some(Instruction::AddF));
        assert_eq!(vm.program().get(7), Some(Instruction::Rot));
        assert_eq!(vm.program().get(9), Some(Instruction::Mod));
        assert_eq!(vm.program().get(10), Some(Instruction::Done));
    }

    #[test]
    fn empty_program_is_just_done() {
        let vm = compile("");
        assert_eq!(vm.program().instructions(), &[Instruction::Done]);
    }

    #[test]
    fn program_overflow() {
        let config = VmConfig {
            program_capacity: 4,
            ..VmConfig::default()
        };
        // two literals take four words, no room left for `done`
        let err = compile_with("1 2", config).unwrap_err();
        assert_eq!(err, CompileError::ProgramOverflow { capacity: 4 });

        assert!(compile_with("1 +", config).is_ok());
    }

    #[test]
    fn data_overflow() {
        let config = VmConfig {
            data_capacity: 6,
            ..VmConfig::default()
        };
        assert!(compile_with("\"hello\"", config).is_ok());
        let err = compile_with("\"hello!\"", config).unwrap_err();
        assert_eq!(err, CompileError::DataOverflow { capacity: 6 });
    }

    #[test]
    fn int_literal_out_of_range() {
        let mut tokens = Arena::new(8);
        tokenize("99999999999", SourceId(0), &mut tokens).unwrap();
        let mut vm = Vm::new(VmConfig::default());
        let err = Compiler::new(&mut vm)
            .compile(TokenStream::new(&tokens))
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidLiteral { kind: "int", .. }));
    }

    #[test]
    fn float_literal_out_of_range() {
        let source = "1.5 99999999999999999999999999999999999999999.0";
        let err = compile_with(source, VmConfig::default()).unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidLiteral {
                loc: Location {
                    source: SourceId(0),
                    line: 1,
                    col: 5,
                },
                kind: "float",
                text: "99999999999999999999999999999999999999999.0".to_string(),
            }
        );

        // Still representable once rounded to f32
        let vm = compile("340282350000000000000000000000000000000.0");
        assert_eq!(vm.program().get(0), Some(Instruction::Float(f32::MAX)));
    }

    #[test]
    fn unknown_word() {
        let err = compile_with("1 2 add", VmConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "1:5: unknown word 'add'");
    }

    #[test]
    fn missing_eof() {
        let tokens: Arena<Token<'_>> = Arena::new(8);
        let mut vm = Vm::new(VmConfig::default());
        let err = Compiler::new(&mut vm)
            .compile(TokenStream::new(&tokens))
            .unwrap_err();
        assert_eq!(err, CompileError::UnexpectedEnd);
    }

    #[test]
    fn compile_stops_at_first_eof() {
        // Two inputs tokenized back to back share one arena
        let mut tokens = Arena::new(8);
        tokenize("1 dup", SourceId(0), &mut tokens).unwrap();
        tokenize("2 +", SourceId(1), &mut tokens).unwrap();

        let mut vm = Vm::new(VmConfig::default());
        Compiler::new(&mut vm)
            .compile(TokenStream::new(&tokens))
            .unwrap();
        assert_eq!(
            vm.program().instructions(),
            &[Instruction::Int(1), Instruction::Dup, Instruction::Done]
        );
    }

    #[test]
    fn disassembly() {
        let vm = compile("1 2.5 \"s\" + .");
        assert_eq!(
            vm.program().to_string(),
            "int(1) float(2.5) str(@0) + . done"
        );
        assert_eq!(Vm::new(VmConfig::default()).program().to_string(), "(empty)");
    }
}
