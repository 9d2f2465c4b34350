use proptest::prelude::*;
use step::{
    arena::Arena,
    bytecode::{Compiler, Instruction},
    lexer::{tokenize, TokenStream},
    token::SourceId,
    vm::VmError,
    Config, Vm, VmConfig,
};

fn output(source: &str) -> String {
    let mut out: Vec<u8> = Vec::new();
    step::run(source, &Config::default(), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn roomy() -> Config {
    Config {
        vm: VmConfig {
            stack_capacity: 4096,
            program_capacity: 4096,
            data_capacity: 4096,
        },
        token_chunk_capacity: 7,
    }
}

#[test]
fn arithmetic_left_to_right() {
    assert_eq!(output("-1 2 * 3 + ."), "1\n");
    assert_eq!(output("10 3 - 2 / ."), "3\n");
}

#[test]
fn comparisons_push_flags() {
    assert_eq!(output("3 5 < ."), "1\n");
    assert_eq!(output("5 3 < ."), "0\n");
}

#[test]
fn float_sum_prints_shortest() {
    assert_eq!(output("1.5 2.5 +. ."), "4\n");
    assert_eq!(output("0.5 0.25 +. ."), "0.75\n");
}

#[test]
fn rot_then_swap() {
    let mut vm = Vm::load("1 2 3 rot . . .", &Config::default()).unwrap();
    let mut out: Vec<u8> = Vec::new();
    vm.run(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "1\n3\n2\n");

    assert_eq!(output("1 2 3 rot swap . . ."), "3\n1\n2\n");
}

#[test]
fn program_over_several_lines() {
    let source = "\"hello\" .\n  1 2\n+ .\n";
    assert_eq!(output(source), "hello\n3\n");
}

#[test]
fn tabs_separate_words() {
    assert_eq!(output("1\t2 + ."), "3\n");
    assert_eq!(output("4 dup\t*\t."), "16\n");
}

#[test]
fn float_literal_must_fit() {
    let err = step::run(
        "99999999999999999999999999999999999999999.0 .",
        &Config::default(),
        &mut std::io::sink(),
    )
    .unwrap_err();
    assert!(format!("{:#}", err).starts_with("compilation failed: 1:1: invalid float literal"));
}

#[test]
fn dup_on_empty_stack_fails_without_output() {
    let mut out: Vec<u8> = Vec::new();
    let err = step::run("dup 1 .", &Config::default(), &mut out).unwrap_err();
    assert!(out.is_empty());
    assert!(matches!(
        err.downcast_ref::<VmError>(),
        Some(VmError::StackUnderflow { needed: 1, .. })
    ));
    assert!(format!("{:#}", err).starts_with("execution failed: "));
}

#[test]
fn tokenize_errors_are_reported() {
    let err = step::run("1 \"open", &Config::default(), &mut std::io::sink()).unwrap_err();
    assert_eq!(
        format!("{:#}", err),
        "tokenizing failed: 1:3: string literal is not terminated"
    );
}

#[test]
fn token_locations() {
    let mut tokens = Arena::new(2);
    tokenize("\"a\" b\nc", SourceId(3), &mut tokens).unwrap();
    let lines: Vec<_> = tokens
        .iter()
        .map(|t| (t.text.as_str(), t.loc.line, t.loc.col))
        .collect();
    assert_eq!(lines, vec![("a", 1, 1), ("b", 1, 5), ("c", 2, 1), ("", 2, 2)]);
    assert!(tokens.iter().all(|t| t.loc.source == SourceId(3)));
}

#[test]
fn strings_do_not_overlap() {
    let vm = Vm::load("\"one\" \"two\" \"three\"", &Config::default()).unwrap();
    let offsets: Vec<_> = vm
        .program()
        .instructions()
        .iter()
        .filter_map(|i| match i {
            Instruction::Str(offset) => Some(*offset),
            _ => None,
        })
        .collect();

    for pair in offsets.windows(2) {
        let first = vm.data().get(pair[0]).unwrap();
        assert!(pair[0].0 + first.len() < pair[1].0);
    }
    assert_eq!(output("\"one\" \"two\" \"three\" . . ."), "three\ntwo\none\n");
}

const WORDS: &[&str] = &[
    "+", "-", "*", "/", "%", "+.", "-.", "*.", "/.", "=", "!=", "<", "<=", ">", ">=", "dup",
    "over", "swap", "drop", "rot", ".",
];

fn token_text() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        (0u32..10_000, 0u32..10_000).prop_map(|(a, b)| format!("{}.{}", a, b)),
        "[a-z ]{0,6}".prop_map(|s| format!("\"{}\"", s)),
        proptest::sample::select(WORDS).prop_map(str::to_string),
    ]
}

proptest! {
    #[test]
    fn one_instruction_per_token(words in prop::collection::vec(token_text(), 0..60)) {
        let source = words.join(" ");
        let config = roomy();

        let mut tokens = Arena::new(config.token_chunk_capacity);
        tokenize(&source, SourceId(0), &mut tokens).unwrap();
        let mut vm = Vm::new(config.vm);
        Compiler::new(&mut vm).compile(TokenStream::new(&tokens)).unwrap();

        let program = vm.program();
        let literals = words
            .iter()
            .filter(|w| {
                let bytes = w.as_bytes();
                bytes[0] == b'"'
                    || bytes[0].is_ascii_digit()
                    || (bytes[0] == b'-' && bytes.get(1).is_some_and(u8::is_ascii_digit))
            })
            .count();

        prop_assert_eq!(program.len(), words.len() + 1);
        prop_assert_eq!(program.words(), words.len() + literals + 1);
        prop_assert_eq!(program.get(words.len()), Some(Instruction::Done));
        prop_assert_eq!(
            program.instructions().iter().filter(|i| **i == Instruction::Done).count(),
            1
        );
    }

    #[test]
    fn strings_print_verbatim(text in "[a-zA-Z0-9!?,;:' ]{0,40}") {
        let source = format!("\"{}\" .", text);
        let mut out: Vec<u8> = Vec::new();
        step::run(&source, &roomy(), &mut out).unwrap();
        prop_assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", text));
    }
}
