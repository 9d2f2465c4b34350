//! step is a small stack-based scripting language. Source text is tokenized,
//! compiled to bytecode and executed by a virtual machine with a typed operand
//! stack.
//!
//! # Example
//!
//! ```text
//! "sum:" .
//! -1 2 * 3 + .
//! 1.5 2.5 +. .
//! 3 5 < .
//! ```
//!
//! prints
//!
//! ```text
//! sum:
//! 1
//! 4
//! 1
//! ```
//!
//! # Words
//!
//! | Word                        | Stack effect              | Brief   |
//! |-----------------------------|---------------------------|---------|
//! | _integer_                   | `-- n`                    | Push an integer, eg. `42`, `-7`. |
//! | _float_                     | `-- x`                    | Push a float, eg. `1.5`, `-0.25`. |
//! | `"text"`                    | `-- s`                    | Push a string. No escapes, must close on the same line. |
//! | `+ - * / %`                 | `a b -- a<op>b`           | Integer arithmetic. `a` is the value pushed first. |
//! | `+. -. *. /.`               | `a b -- a<op>b`           | Float arithmetic. |
//! | `= != < <= > >=`            | `a b -- 0/1`              | Integer comparison. |
//! | `dup`                       | `a -- a a`                | Duplicate the top value. |
//! | `over`                      | `a b -- a b a`            | Copy the second value to the top. |
//! | `swap`                      | `a b -- b a`              | Exchange the top two values. |
//! | `drop`                      | `a --`                    | Discard the top value. |
//! | `rot`                       | `a b c -- b c a`          | Move the third value to the top. |
//! | `.`                         | `a --`                    | Pop and print a value on its own line. |
//!
//! # Important notes
//!
//! - Words are separated by spaces or tabs. Lines are separated by `\n`.
//! - A blank line ends the program, anything after it is ignored.
//! - There is no implicit conversion between ints and floats. Mixing them,
//!   or running a word without enough values on the stack, stops the program
//!   with an error.
//! - The VM has fixed capacities for its stack, its program and its string
//!   data, see [`vm::VmConfig`].

use anyhow::Context;
use std::io;
use tracing::debug;

pub mod arena;
pub mod bytecode;
pub mod lexer;
pub mod token;
pub mod view;
pub mod vm;

pub use vm::{Vm, VmConfig};

/// Settings for a whole run
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Config {
    pub vm: VmConfig,
    /// Number of tokens per arena chunk
    pub token_chunk_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            vm: VmConfig::default(),
            token_chunk_capacity: 1024,
        }
    }
}

/// Compile and execute `source`, writing the program output to `out`
pub fn run<W: io::Write>(source: &str, config: &Config, out: &mut W) -> anyhow::Result<()> {
    let mut vm = Vm::load(source, config)?;
    execute(&mut vm, out)
}

/// Run a loaded VM to completion, writing the program output to `out`
pub fn execute<W: io::Write>(vm: &mut Vm, out: &mut W) -> anyhow::Result<()> {
    if let Err(e) = vm.run(out) {
        debug!("{}", vm.dump_stack());
        return Err(e).context("execution failed");
    }
    Ok(())
}
