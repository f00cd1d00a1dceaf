//! Binary entry point for the `hset` command-line tool.
//!
//! A thin driver over the library: build hset files from hash lists,
//! inspect and query existing files, and compose two files with the set
//! operators. All real work happens in the `hset` library crate; this
//! file only parses arguments and formats output.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use hset::{add_text_records, HashKind, HashsetBuilder, Reader, SetOp};

#[derive(Parser)]
#[command(name = "hset", version, about = "Hash set files: build, query, compose")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an hset file from a text hash list.
    Build(BuildArgs),
    /// Print the metadata of an hset file.
    Info {
        file: PathBuf,
    },
    /// Check hex hashes (arguments, or stdin when none) for membership.
    Query {
        file: PathBuf,
        /// Column to query, e.g. md5, sha1, sha2_256, sizes.
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        kind: String,
        hashes: Vec<String>,
    },
    /// Write the union of two hset files.
    Union(ComposeArgs),
    /// Write the intersection of two hset files.
    Intersect(ComposeArgs),
    /// Write the left file minus the right file.
    Subtract(ComposeArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Hashset name stored in the file header.
    name: String,
    /// Column types, in input-column order (e.g. sizes md5 sha1).
    #[arg(required = true)]
    types: Vec<String>,
    /// Description stored in the file header.
    #[arg(short, long, default_value = "")]
    desc: String,
    /// Input hash list; one record per line, `-` for stdin.
    #[arg(short, long, default_value = "-")]
    input: String,
    #[arg(short, long)]
    output: PathBuf,
    /// Directory for sort spool files.
    #[arg(long, default_value = ".")]
    tmpdir: PathBuf,
    /// Omit the record table (and per-column record indexes).
    #[arg(long)]
    no_records: bool,
    /// Omit the hash columns.
    #[arg(long)]
    no_hashsets: bool,
    /// Skip malformed lines instead of failing, reporting them at the end.
    #[arg(long)]
    lenient: bool,
    /// Hint bucket bits (0 = single range window, 1-8 = block buckets).
    #[arg(long, default_value_t = hset::DEFAULT_BUCKET_BITS)]
    bucket_bits: u8,
}

#[derive(Args)]
struct ComposeArgs {
    left: PathBuf,
    right: PathBuf,
    /// Name for the result; defaults to the left set's name.
    #[arg(short, long)]
    name: Option<String>,
    #[arg(short, long, default_value = "")]
    desc: String,
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long, default_value = ".")]
    tmpdir: PathBuf,
    #[arg(long)]
    no_records: bool,
    #[arg(long)]
    no_hashsets: bool,
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Build(args) => build(args),
        Command::Info { file } => info(&file),
        Command::Query { file, kind, hashes } => query(&file, &kind, &hashes),
        Command::Union(args) => run_compose(args, SetOp::Union),
        Command::Intersect(args) => run_compose(args, SetOp::Intersect),
        Command::Subtract(args) => run_compose(args, SetOp::Difference),
    }
}

fn parse_kind(name: &str) -> anyhow::Result<HashKind> {
    HashKind::from_name(name).with_context(|| format!("unrecognized hash type '{name}'"))
}

fn build(args: BuildArgs) -> anyhow::Result<()> {
    let kinds = args
        .types
        .iter()
        .map(|t| parse_kind(t))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut builder = HashsetBuilder::open(
        &args.name,
        &args.desc,
        &kinds,
        &args.output,
        &args.tmpdir,
        !args.no_records,
        !args.no_hashsets,
    )?;
    builder.set_bucket_bits(args.bucket_bits);

    let skipped = if args.input == "-" {
        add_text_records(&mut builder, io::stdin().lock(), args.lenient)?
    } else {
        let f = File::open(&args.input).with_context(|| format!("opening {}", args.input))?;
        add_text_records(&mut builder, BufReader::new(f), args.lenient)?
    };

    let records = builder.pushed_records();
    let bytes = builder.finalize()?;
    eprintln!("wrote {} ({records} records, {bytes} bytes)", args.output.display());
    for e in &skipped {
        eprintln!("skipped: {e}");
    }
    Ok(())
}

fn info(file: &PathBuf) -> anyhow::Result<()> {
    let r = Reader::open_path(file)?;
    println!("name:        {}", r.name());
    println!("description: {}", r.description());
    println!("timestamp:   {}", r.timestamp());
    println!("sha2-256:    {}", hex::encode(r.sha2_256()));
    for i in 0..r.column_count() {
        println!(
            "column {i}:    {} ({} hashes)",
            r.column_kind(i).name(),
            r.hash_count(i)
        );
    }
    match r.record_header() {
        Some(rhdr) => {
            let fields: Vec<&str> = rhdr.fields.iter().map(|f| f.name.as_str()).collect();
            println!("records:     {} [{}]", rhdr.record_count, fields.join(", "));
        }
        None => println!("records:     none"),
    }
    Ok(())
}

fn query(file: &PathBuf, kind: &str, hashes: &[String]) -> anyhow::Result<()> {
    let r = Reader::open_path(file)?;
    let kind = parse_kind(kind)?;
    let Some(col) = r.column_index(kind) else {
        bail!("{} has no {} column", file.display(), kind.name());
    };

    let mut misses = 0usize;
    let mut check = |line: &str| {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let hit = match hex::decode(line) {
            Ok(bytes) => r.contains(col, &bytes),
            Err(_) => false,
        };
        if !hit {
            misses += 1;
        }
        println!("{} {line}", if hit { "hit " } else { "miss" });
    };

    if hashes.is_empty() {
        for line in io::stdin().lock().lines() {
            check(&line?);
        }
    } else {
        for h in hashes {
            check(h);
        }
    }

    if misses > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_compose(args: ComposeArgs, op: SetOp) -> anyhow::Result<()> {
    let l = Reader::open_path(&args.left)?;
    let r = Reader::open_path(&args.right)?;
    let name = args.name.unwrap_or_else(|| l.name().to_string());

    let builder = hset::compose(
        &l,
        &r,
        op,
        &name,
        &args.desc,
        &args.output,
        &args.tmpdir,
        !args.no_records,
        !args.no_hashsets,
        None,
    )?;
    let rows = builder.pushed_records();
    let bytes = builder.finalize()?;
    eprintln!("wrote {} ({rows} records, {bytes} bytes)", args.output.display());
    Ok(())
}
