//! Virtual machine that runs the bytecode

use crate::{
    arena::Arena,
    bytecode::{Compiler, DataOffset, Instruction, Program},
    lexer::{tokenize, TokenStream},
    token::{SourceId, Token},
    Config,
};
use anyhow::Context;
use std::{fmt::Write as _, io};
use tracing::{debug, trace};

/// Fixed capacities of the VM buffers
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct VmConfig {
    /// Maximum operand stack depth
    pub stack_capacity: usize,
    /// Program size in words
    pub program_capacity: usize,
    /// Data segment size in bytes
    pub data_capacity: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_capacity: 256,
            program_capacity: 256,
            data_capacity: 256,
        }
    }
}

/// Runtime value on the operand stack
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Str(DataOffset),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
        }
    }
}

/// Append-only storage for string literals.
///
/// Every string is stored with a trailing NUL and addressed by the offset of
/// its first byte.
#[derive(Debug, Clone)]
pub struct DataSegment {
    bytes: Vec<u8>,
    capacity: usize,
}

impl DataSegment {
    pub fn new(capacity: usize) -> Self {
        DataSegment {
            bytes: Vec::new(),
            capacity,
        }
    }

    /// Copy `string` in. Returns `None` if it does not fit.
    pub fn append(&mut self, string: &[u8]) -> Option<DataOffset> {
        if self.bytes.len() + string.len() + 1 > self.capacity {
            return None;
        }

        let offset = DataOffset(self.bytes.len());
        self.bytes.extend_from_slice(string);
        self.bytes.push(0);
        Some(offset)
    }

    /// The string starting at `offset`, without its NUL
    pub fn get(&self, offset: DataOffset) -> Option<&[u8]> {
        let tail = self.bytes.get(offset.0..)?;
        let end = tail.iter().position(|&b| b == 0)?;
        Some(&tail[..end])
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("ip {ip}: '{instruction}' needs {needed} values on the stack, found {depth}")]
    StackUnderflow {
        ip: usize,
        instruction: Instruction,
        needed: usize,
        depth: usize,
    },
    #[error("ip {ip}: stack overflow, capacity is {capacity}")]
    StackOverflow { ip: usize, capacity: usize },
    #[error("ip {ip}: '{instruction}' expects {expected} operands, found {found}")]
    TypeMismatch {
        ip: usize,
        instruction: Instruction,
        expected: &'static str,
        found: &'static str,
    },
    #[error("ip {ip}: '{instruction}' divides by zero")]
    DivisionByZero { ip: usize, instruction: Instruction },
    #[error("ip {ip}: no string at data offset {offset}")]
    InvalidDataOffset { ip: usize, offset: usize },
    #[error("ip {ip}: instruction pointer is outside the program")]
    InstructionPointerOutOfBounds { ip: usize },
    #[error("program has already finished")]
    Halted,
    #[error("could not write output")]
    Output(#[from] io::Error),
}

type VmResult<T> = Result<T, VmError>;

/// Outcome of a single step
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Step {
    Continue,
    Halt,
}

/// Virtual machine representation
#[derive(Debug)]
pub struct Vm {
    pub(crate) program: Program,
    ip: usize, // instruction pointer

    stack: Vec<Value>,
    stack_capacity: usize,

    pub(crate) data: DataSegment,
    halted: bool,
}

impl Vm {
    /// Create an empty VM, ready to be filled by the `Compiler`
    pub fn new(config: VmConfig) -> Self {
        Vm {
            program: Program::new(config.program_capacity),
            ip: 0,
            stack: Vec::with_capacity(config.stack_capacity),
            stack_capacity: config.stack_capacity,
            data: DataSegment::new(config.data_capacity),
            halted: false,
        }
    }

    /// Tokenize and compile `source` into a fresh VM.
    ///
    /// The tokens only live for the duration of this call.
    pub fn load(source: &str, config: &Config) -> anyhow::Result<Self> {
        Vm::load_with(source, config, |_| {})
    }

    /// Same as [`Vm::load`], showing every token to `on_token` once the whole
    /// source is tokenized and before it is compiled.
    pub fn load_with<F>(source: &str, config: &Config, mut on_token: F) -> anyhow::Result<Self>
    where
        F: FnMut(&Token<'_>),
    {
        let mut tokens = Arena::new(config.token_chunk_capacity);
        tokenize(source, SourceId(0), &mut tokens).context("tokenizing failed")?;
        for token in tokens.iter() {
            on_token(token);
        }

        let mut vm = Vm::new(config.vm);
        Compiler::new(&mut vm)
            .compile(TokenStream::new(&tokens))
            .context("compilation failed")?;

        Ok(vm)
    }

    /// Run until `Done`, writing the output of `.` to `out`
    pub fn run<W: io::Write>(&mut self, out: &mut W) -> VmResult<()> {
        if self.halted {
            return Err(VmError::Halted);
        }

        while self.step(out)? == Step::Continue {}
        debug!(depth = self.stack.len(), "program finished");
        Ok(())
    }

    /// Fetch, decode and execute one instruction
    pub fn step<W: io::Write>(&mut self, out: &mut W) -> VmResult<Step> {
        if self.halted {
            return Err(VmError::Halted);
        }

        let ip = self.ip;
        let instruction = self
            .program
            .get(ip)
            .ok_or(VmError::InstructionPointerOutOfBounds { ip })?;
        trace!(ip, %instruction, depth = self.stack.len(), "step");

        match instruction {
            Instruction::Int(n) => self.push(Value::Int(n))?,
            Instruction::Float(x) => self.push(Value::Float(x))?,
            Instruction::Str(offset) => {
                if self.data.get(offset).is_none() {
                    return Err(VmError::InvalidDataOffset {
                        ip,
                        offset: offset.0,
                    });
                }
                self.push(Value::Str(offset))?
            }
            Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::Mod => self.ins_int_arithmetic(instruction)?,
            Instruction::AddF | Instruction::SubF | Instruction::MulF | Instruction::DivF => {
                self.ins_float_arithmetic(instruction)?
            }
            Instruction::Eq
            | Instruction::Neq
            | Instruction::Lt
            | Instruction::Le
            | Instruction::Gt
            | Instruction::Ge => self.ins_compare(instruction)?,
            Instruction::Dup => {
                self.require(instruction, 1)?;
                self.push(self.peek(0))?
            }
            Instruction::Over => {
                self.require(instruction, 2)?;
                self.push(self.peek(1))?
            }
            Instruction::Swap => {
                self.require(instruction, 2)?;
                let top = self.stack.len() - 1;
                self.stack.swap(top, top - 1);
            }
            Instruction::Drop => {
                self.require(instruction, 1)?;
                self.stack.pop();
            }
            Instruction::Rot => {
                self.require(instruction, 3)?;
                let third = self.stack.len() - 3;
                self.stack[third..].rotate_left(1);
            }
            Instruction::Dump => {
                self.require(instruction, 1)?;
                let value = self.peek(0);
                self.write_value(out, value)?;
                self.stack.pop();
            }
            Instruction::Done => {
                self.halted = true;
                return Ok(Step::Halt);
            }
        }

        self.ip += 1;
        Ok(Step::Continue)
    }

    /// Pop two ints and push the result
    fn ins_int_arithmetic(&mut self, instruction: Instruction) -> VmResult<()> {
        let (a, b) = self.int_operands(instruction)?;

        let result = match instruction {
            Instruction::Add => a.wrapping_add(b),
            Instruction::Sub => a.wrapping_sub(b),
            Instruction::Mul => a.wrapping_mul(b),
            Instruction::Div | Instruction::Mod if b == 0 => {
                return Err(VmError::DivisionByZero {
                    ip: self.ip,
                    instruction,
                })
            }
            Instruction::Div => a.wrapping_div(b),
            Instruction::Mod => a.wrapping_rem(b),
            _ => unreachable!("not an integer operation: {}", instruction),
        };

        self.replace_operands(Value::Int(result));
        Ok(())
    }

    /// Pop two floats and push the result
    fn ins_float_arithmetic(&mut self, instruction: Instruction) -> VmResult<()> {
        self.require(instruction, 2)?;
        let (a, b) = match (self.peek(1), self.peek(0)) {
            (Value::Float(a), Value::Float(b)) => (a, b),
            (Value::Float(_), other) | (other, _) => {
                return Err(self.type_mismatch(instruction, "float", other))
            }
        };

        let result = match instruction {
            Instruction::AddF => a + b,
            Instruction::SubF => a - b,
            Instruction::MulF => a * b,
            Instruction::DivF => a / b,
            _ => unreachable!("not a float operation: {}", instruction),
        };

        self.replace_operands(Value::Float(result));
        Ok(())
    }

    /// Compare two ints, push `1` if the comparison holds, else `0`
    fn ins_compare(&mut self, instruction: Instruction) -> VmResult<()> {
        let (a, b) = self.int_operands(instruction)?;

        let holds = match instruction {
            Instruction::Eq => a == b,
            Instruction::Neq => a != b,
            Instruction::Lt => a < b,
            Instruction::Le => a <= b,
            Instruction::Gt => a > b,
            Instruction::Ge => a >= b,
            _ => unreachable!("not a comparison: {}", instruction),
        };

        self.replace_operands(Value::Int(holds as i32));
        Ok(())
    }

    /// The two topmost values as `(a, b)` where `b` is on top. Both must be
    /// ints. The stack is left untouched.
    fn int_operands(&self, instruction: Instruction) -> VmResult<(i32, i32)> {
        self.require(instruction, 2)?;
        match (self.peek(1), self.peek(0)) {
            (Value::Int(a), Value::Int(b)) => Ok((a, b)),
            (Value::Int(_), other) | (other, _) => {
                Err(self.type_mismatch(instruction, "int", other))
            }
        }
    }

    /// Replace the two operands of a binary instruction with its result
    fn replace_operands(&mut self, result: Value) {
        let len = self.stack.len();
        self.stack.truncate(len - 2);
        self.stack.push(result);
    }

    fn write_value<W: io::Write>(&self, out: &mut W, value: Value) -> VmResult<()> {
        match value {
            Value::Int(n) => writeln!(out, "{}", n)?,
            Value::Float(x) => writeln!(out, "{}", x)?,
            Value::Str(offset) => {
                let bytes = self
                    .data
                    .get(offset)
                    .ok_or(VmError::InvalidDataOffset {
                        ip: self.ip,
                        offset: offset.0,
                    })?;
                out.write_all(bytes)?;
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn require(&self, instruction: Instruction, needed: usize) -> VmResult<()> {
        if self.stack.len() < needed {
            return Err(VmError::StackUnderflow {
                ip: self.ip,
                instruction,
                needed,
                depth: self.stack.len(),
            });
        }
        Ok(())
    }

    fn type_mismatch(
        &self,
        instruction: Instruction,
        expected: &'static str,
        found: Value,
    ) -> VmError {
        VmError::TypeMismatch {
            ip: self.ip,
            instruction,
            expected,
            found: found.type_name(),
        }
    }

    /// Value `depth` places below the top. Callers check the depth first.
    fn peek(&self, depth: usize) -> Value {
        self.stack[self.stack.len() - 1 - depth]
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.stack.len() >= self.stack_capacity {
            return Err(VmError::StackOverflow {
                ip: self.ip,
                capacity: self.stack_capacity,
            });
        }

        self.stack.push(value);
        Ok(())
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn data(&self) -> &DataSegment {
        &self.data
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Render the stack bottom to top, one value per line
    pub fn dump_stack(&self) -> String {
        let mut dump = format!("stack[{}]:\n", self.stack.len());
        for value in &self.stack {
            let _ = match value {
                Value::Int(n) => writeln!(dump, "  {}", n),
                Value::Float(x) => writeln!(dump, "  {}", x),
                Value::Str(offset) => {
                    let text = self.data.get(*offset).unwrap_or_default();
                    writeln!(dump, "  {:?}", String::from_utf8_lossy(text))
                }
            };
        }
        dump
    }
}
