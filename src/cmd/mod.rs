mod seq;

const USAGE: &str = "\
A utility for generating sequences of datetimes from RFC 5545 recurrence
rules.

USAGE:
    recur <command> ...

COMMANDS:
    seq    Generate a sequence of datetimes or dates
";

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    match &*crate::args::command(p, USAGE)? {
        "seq" => seq::run(p),
        unk => anyhow::bail!("unrecognized command `{unk}`"),
    }
}
