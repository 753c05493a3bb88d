/*!
Command line parsing, built on `lexopt`.

A command describes itself with a [`Doc`] and collects its arguments into a
single [`Configurable`] value. `-h` renders a condensed help page and
`--help` a complete one. Both, and `--version`, surface as errors that
`main` prints to stdout with a successful exit code.
*/

use std::{fmt::Write, str::FromStr};

use {
    anyhow::Context,
    lexopt::{Arg, Parser, ValueExt},
};

pub mod flags;

/// Something that collects command line arguments.
pub trait Configurable: std::fmt::Debug {
    /// Consumes `arg`, along with its value if it has one.
    ///
    /// Returns `false` when `arg` isn't recognized.
    fn configure(
        &mut self,
        p: &mut Parser,
        arg: &mut Arg,
    ) -> anyhow::Result<bool>;

    /// Documents every positional argument and flag that `configure`
    /// recognizes. Positional arguments are shown in the order given.
    fn usage(&self) -> &[Usage];
}

/// Feeds every remaining argument in `p` to `target`.
pub fn configure(
    p: &mut Parser,
    doc: &Doc,
    target: &mut dyn Configurable,
) -> anyhow::Result<()> {
    while let Some(arg) = p.next()? {
        let mut owned = match arg {
            Arg::Short('h') => {
                return Err(Help(doc.render(target.usage(), false)).into());
            }
            Arg::Long("help") => {
                return Err(Help(doc.render(target.usage(), true)).into());
            }
            Arg::Long("version") => return Err(Version.into()),
            // The name borrows from `p`, which `configure` needs back.
            Arg::Long(name) => OwnedArg::Long(name.to_string()),
            Arg::Short(c) => OwnedArg::Short(c),
            Arg::Value(v) => OwnedArg::Value(v),
        };
        let mut arg = owned.as_arg();
        if !target.configure(p, &mut arg)? {
            return Err(arg.unexpected().into());
        }
    }
    Ok(())
}

/// An argument that doesn't borrow from its parser.
enum OwnedArg {
    Short(char),
    Long(String),
    Value(std::ffi::OsString),
}

impl OwnedArg {
    fn as_arg(&mut self) -> Arg<'_> {
        match *self {
            OwnedArg::Short(c) => Arg::Short(c),
            OwnedArg::Long(ref name) => Arg::Long(name),
            OwnedArg::Value(ref mut v) => Arg::Value(std::mem::take(v)),
        }
    }
}

/// Returns the name of the sub-command to run.
///
/// Without one, the top-level usage is reported as an error.
pub fn command(p: &mut Parser, usage: &str) -> anyhow::Result<String> {
    let usage = usage.trim();
    match p.next()? {
        None => anyhow::bail!("{usage}"),
        Some(Arg::Value(name)) => Ok(name.string()?),
        Some(Arg::Short('h') | Arg::Long("help")) => {
            Err(Help(usage.to_string()).into())
        }
        Some(Arg::Long("version")) => Err(Version.into()),
        Some(arg) => Err(arg.unexpected().into()),
    }
}

/// Parses the value of a flag, naming the flag in any error.
pub fn parse<T>(p: &mut Parser, flag: &'static str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
{
    let value = p.value().context(flag)?.string().context(flag)?;
    value.parse().map_err(|err| anyhow::Error::msg(err).context(flag))
}

const TIP: &str = "\
TIP:
    -h lists the flags, --help also explains each of them

";

/// The help page of a command.
#[derive(Clone, Copy, Debug)]
pub struct Doc {
    /// What the command does, in one or more paragraphs.
    pub about: &'static str,
    /// How to invoke the command, e.g., `recur seq <frequency> [<start>]`.
    pub synopsis: &'static str,
    /// Only the first example is shown by `-h`.
    pub examples: &'static [Example],
}

/// A documented invocation of a command, along with its exact output.
#[derive(Clone, Copy, Debug)]
pub struct Example {
    pub about: &'static str,
    /// The command line, starting with the binary name.
    pub command: &'static str,
    pub output: &'static str,
}

impl Doc {
    fn render(&self, usages: &[Usage], long: bool) -> String {
        let mut out = String::new();
        writeln!(out, "{}\n", self.about.trim()).unwrap();
        writeln!(out, "USAGE:\n    {}\n", self.synopsis).unwrap();
        out.push_str(TIP);
        let shown = if long { self.examples.len() } else { 1 };
        if shown > 0 {
            out.push_str("EXAMPLES:\n");
        }
        for example in self.examples.iter().take(shown) {
            writeln!(out, "    {}\n", example.about.trim()).unwrap();
            writeln!(out, "        $ {}", example.command).unwrap();
            for line in example.output.trim().lines() {
                writeln!(out, "        {line}").unwrap();
            }
            out.push('\n');
        }

        let (args, flags): (Vec<Usage>, Vec<Usage>) =
            usages.iter().copied().partition(|u| u.kind == Kind::Arg);
        let mut flags = flags;
        flags.extend([Help::USAGE, Version::USAGE]);
        flags.sort_by_key(|u| u.long_name());
        let table = if long { Usage::details } else { Usage::table };
        writeln!(out, "REQUIRED ARGUMENTS:\n{}", table(&args)).unwrap();
        write!(out, "OPTIONS:\n{}", table(&flags)).unwrap();
        out.trim_end().to_string()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kind {
    Arg,
    Flag,
}

/// The documentation of one positional argument or flag.
#[derive(Clone, Copy, Debug)]
pub struct Usage {
    kind: Kind,
    /// E.g., `-c/--count <number>`.
    format: &'static str,
    /// A single line.
    short: &'static str,
    /// Paragraphs separated by blank lines. Lines within a paragraph are
    /// re-wrapped.
    long: &'static str,
}

impl Usage {
    pub const fn arg(
        format: &'static str,
        short: &'static str,
        long: &'static str,
    ) -> Usage {
        Usage { kind: Kind::Arg, format, short, long }
    }

    pub const fn flag(
        format: &'static str,
        short: &'static str,
        long: &'static str,
    ) -> Usage {
        Usage { kind: Kind::Flag, format, short, long }
    }

    /// The name flags are sorted by, e.g., `count` for `-c/--count`.
    fn long_name(&self) -> &'static str {
        let name = self.format.split(' ').next().unwrap_or(self.format);
        let name = name.rsplit('/').next().unwrap_or(name);
        name.trim_start_matches('-')
    }

    /// One aligned line per usage.
    fn table(usages: &[Usage]) -> String {
        let width = usages.iter().map(|u| u.format.len()).max().unwrap_or(0);
        let mut out = String::new();
        for u in usages {
            writeln!(out, "    {:width$}  {}", u.format, u.short).unwrap();
        }
        out
    }

    /// Every usage followed by its long description, wrapped and indented.
    fn details(usages: &[Usage]) -> String {
        let indent = " ".repeat(8);
        let opts = textwrap::Options::new(79)
            .initial_indent(&indent)
            .subsequent_indent(&indent);
        let mut blocks = vec![];
        for u in usages {
            let mut block = format!("    {}\n", u.format);
            let paragraphs: Vec<String> = u
                .long
                .trim()
                .split("\n\n")
                .map(|para| textwrap::fill(&para.replace('\n', " "), &opts))
                .collect();
            block.push_str(&paragraphs.join("\n\n"));
            block.push('\n');
            blocks.push(block);
        }
        blocks.join("\n")
    }
}

/// The output of `-h` or `--help`.
#[derive(Debug)]
pub struct Help(String);

impl Help {
    const USAGE: Usage = Usage::flag(
        "-h/--help",
        "Print help. Use --help for complete documentation.",
        r#"
Print help and exit.

-h prints one line per flag and a single example. --help prints everything.
"#,
    );
}

impl std::fmt::Display for Help {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Help {}

/// The output of `--version`.
#[derive(Debug)]
pub struct Version;

impl Version {
    const USAGE: Usage = Usage::flag(
        "--version",
        "Print the version of recur.",
        r#"
Print the version of recur and exit.
"#,
    );
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "recur {}", env!("CARGO_PKG_VERSION"))
    }
}

impl std::error::Error for Version {}
