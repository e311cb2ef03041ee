use std::path::PathBuf;

use crate::prelude::{load, parse_hex, Address, Error, SymResult, SymbolIndex};

use super::{parse_query, CallbackKind, Flow, InteractiveCallback, Resolution};

pub fn default_actions() -> ActionList {
    ActionList {
        actions: vec![
            Action::new(
                "?",
                vec![Param::with_default("command", "")],
                help_parser,
                "Display help",
            ),
            Action::new("q", vec![], exit_parser, "Quit the program"),
            Action::new(
                "sym",
                vec![Param::new("name")],
                name_parser,
                "Show the address of a symbol",
            ),
            Action::new(
                "exact",
                vec![Param::new("address")],
                exact_parser,
                "Show the symbol starting exactly at an address",
            ),
            Action::new(
                "load",
                vec![Param::new("path")],
                load_parser,
                "Replace the symbols with the ones from another map file",
            ),
        ],
    }
}

/// Command syntax:
/// An action name followed by its parameters, for example
/// sym kernel_main
/// Anything that is not an action is taken as an address query
/// (hex or a `RIP: <addr>, ...` line) and a blank line ends the session.
/// Action names must never be valid hex.
pub struct ActionList {
    actions: Vec<Action>,
}

impl ActionList {
    pub fn eval(&self, input: &str) -> SymResult<Commands> {
        let input = input.trim();
        let mut split = input.splitn(2, char::is_whitespace);
        let cmd = split.next().unwrap_or("");
        let rest = split.next().unwrap_or("");

        if let Some(action) = self.actions.iter().find(|x| x.name == cmd) {
            let args =
                shell_words::split(rest).map_err(|_| Error::InvalidUserInput(rest.into()))?;
            return action.eval(&args);
        }

        Ok(match parse_query(input)? {
            Some(address) => Commands::Resolve(address),
            None => Commands::Exit,
        })
    }

    fn help(&self, f: &mut impl InteractiveCallback, cmd: &str) -> SymResult<()> {
        if cmd.is_empty() {
            f(
                "<address> | RIP: <address>, ... Resolve an address to symbol + offset\n",
                CallbackKind::None,
            )?;
        }
        let mut printed = false;
        for action in &self.actions {
            if action.name.starts_with(cmd) {
                printed = true;
                action.help(f)?;
            }
        }
        if printed {
            Ok(())
        } else {
            Err(Error::UnknownCommand(cmd.into()))
        }
    }
}

#[derive(Default)]
pub struct Param {
    name: String,
    default_value: Option<String>,
}

impl Param {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }

    fn with_default(name: &str, default_value: &str) -> Self {
        Self {
            name: name.into(),
            default_value: Some(default_value.into()),
        }
    }
}

type CommandParser = fn(&[String], &[Param]) -> SymResult<Commands>;

pub struct Action {
    help: String,
    name: String,
    params: Vec<Param>,
    parser: CommandParser,
}

impl Action {
    fn new(name: &str, params: Vec<Param>, parser: CommandParser, help: &str) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            params,
            parser,
        }
    }

    fn eval(&self, args: &[String]) -> SymResult<Commands> {
        (self.parser)(args, &self.params)
    }

    fn help(&self, f: &mut impl InteractiveCallback) -> SymResult<()> {
        f(&self.name, CallbackKind::None)?;
        self.params.iter().try_for_each(|x| {
            if let Some(default_value) = &x.default_value {
                f(
                    &format!(" [{}='{}']", x.name, default_value),
                    CallbackKind::None,
                )
            } else {
                f(&format!(" [{}]", x.name), CallbackKind::None)
            }
        })?;
        f(&format!(" {}\n", self.help), CallbackKind::None)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Commands {
    Exit,
    Help(String),
    Resolve(Address),
    Exact(Address),
    Name(String),
    Load(PathBuf),
}

impl Commands {
    pub fn execute(
        &self,
        f: &mut impl InteractiveCallback,
        index: &mut SymbolIndex,
        actions: &ActionList,
    ) -> SymResult<Flow> {
        match self {
            Commands::Exit => return Ok(Flow::Exit),
            Commands::Help(cmd) => actions.help(f, cmd)?,
            Commands::Resolve(address) => {
                let res = Resolution::resolve(index, *address)?;
                f(&format!("{}\n", res), CallbackKind::Symbol)?;
            }
            Commands::Exact(address) => match index.lookup_exact(*address) {
                Some(sym) => f(&format!("{:#x}: {}\n", address, sym.name), CallbackKind::Symbol)?,
                None => f(
                    &format!("no symbol starts at {:#x}\n", address),
                    CallbackKind::None,
                )?,
            },
            Commands::Name(name) => match index.lookup_name(name) {
                Some(sym) => {
                    let size = sym
                        .size()
                        .map(|size| format!(" ({:#x} bytes)", size))
                        .unwrap_or_default();
                    f(
                        &format!("{}: {:#x}{}\n", sym.name, sym.start_addr, size),
                        CallbackKind::Symbol,
                    )?
                }
                None => f(&format!("unknown symbol '{}'\n", name), CallbackKind::None)?,
            },
            Commands::Load(path) => {
                *index = load(path)?;
                f(
                    &format!("{} symbols from {}\n", index.len(), path.display()),
                    CallbackKind::None,
                )?;
            }
        }
        Ok(Flow::Continue)
    }
}

/* Command parsers */

fn get_arg_or(args: &[String], params: &[Param], index: usize) -> SymResult<String> {
    match (args.get(index), params.get(index)) {
        (Some(arg), Some(_)) => Ok(arg.to_string()),
        (
            None,
            Some(Param {
                default_value: Some(def),
                ..
            }),
        ) => Ok(def.into()),
        _ => Err(Error::InsufficientArguments),
    }
}

fn has_too_many_args(args: &[String], params: &[Param]) -> SymResult<()> {
    if args.len() > params.len() {
        Err(Error::TooManyArguments)
    } else {
        Ok(())
    }
}

fn get_address(args: &[String], params: &[Param], index: usize) -> SymResult<Address> {
    let arg = get_arg_or(args, params, index)?;
    parse_hex(&arg).ok_or(Error::InvalidUserInput(arg))
}

fn help_parser(args: &[String], params: &[Param]) -> SymResult<Commands> {
    has_too_many_args(args, params)?;

    let cmd = get_arg_or(args, params, 0)?;

    Ok(Commands::Help(cmd))
}

fn exit_parser(args: &[String], params: &[Param]) -> SymResult<Commands> {
    has_too_many_args(args, params)?;
    Ok(Commands::Exit)
}

fn name_parser(args: &[String], params: &[Param]) -> SymResult<Commands> {
    has_too_many_args(args, params)?;
    Ok(Commands::Name(get_arg_or(args, params, 0)?))
}

fn exact_parser(args: &[String], params: &[Param]) -> SymResult<Commands> {
    has_too_many_args(args, params)?;
    Ok(Commands::Exact(get_address(args, params, 0)?))
}

fn load_parser(args: &[String], params: &[Param]) -> SymResult<Commands> {
    has_too_many_args(args, params)?;
    let path = get_arg_or(args, params, 0)?;
    Ok(Commands::Load(PathBuf::from(
        shellexpand::tilde(&path).into_owned(),
    )))
}
