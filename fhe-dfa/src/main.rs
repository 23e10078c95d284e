//! Command-line front end for the homomorphic DFA evaluation engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fhe_dfa::error::Error;
use fhe_dfa::graph::Graph;
use fhe_dfa::keys::{BootstrapKey, ClientKey};
use fhe_dfa::parameters::DEFAULT_PARAMETERS;
use fhe_dfa::runner::{
    OfflineRunner, Qtrlwe2Runner, QtrlweRunner, ReversedRunner, Runner,
    DEFAULT_BOOTSTRAP_INTERVAL, DEFAULT_FIRST_LUT_DEPTH,
};
use fhe_dfa::stream::{CiphertextStream, ForwardStream, ReversedStream};
use fhe_dfa::{ltl, ser};

#[derive(Debug, Parser)]
#[command(name = "fhe-dfa")]
#[command(about = "Evaluate deterministic finite automata over TFHE-encrypted inputs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a secret key.
    Genkey {
        #[arg(long)]
        out: PathBuf,
    },
    /// Generate the bootstrapping-key record from a secret key.
    Genbkey {
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Encrypt an input file to a ciphertext blob, LSB first per byte.
    Enc {
        #[arg(long)]
        key: PathBuf,
        #[arg(long = "in")]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Number of low bits to take from every byte.
        #[arg(long, default_value_t = 8)]
        ap: usize,
    },
    /// Decrypt an acceptance ciphertext.
    Dec {
        #[arg(long)]
        key: PathBuf,
        #[arg(long = "in")]
        input: PathBuf,
    },
    /// Evaluate with the offline (right-to-left) strategy.
    RunOffline(RunArgs),
    /// Evaluate with the online qtrlwe strategy.
    RunQtrlwe(RunArgs),
    /// Evaluate with the online reversed strategy.
    RunReversed(RunArgs),
    /// Evaluate with the online qtrlwe2 (batched window) strategy.
    RunQtrlwe2(RunQtrlwe2Args),
    /// Compile an LTL formula to a DFA spec.
    Ltl2spec(LtlArgs),
    /// Compile an LTL formula to Graphviz DOT.
    Ltl2dot(LtlArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    spec: PathBuf,
    #[arg(long = "in")]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    /// Bootstrapping-key record; required for the online-reversed
    /// strategy, optional elsewhere.
    #[arg(long)]
    bkey: Option<PathBuf>,
    /// Bootstrap interval in steps (offline: CMUX levels).
    #[arg(long, default_value_t = DEFAULT_BOOTSTRAP_INTERVAL)]
    interval: usize,
    /// Alphabet width in atomic propositions; when given, the input
    /// length must be a multiple of it.
    #[arg(long)]
    ap: Option<usize>,
}

#[derive(Debug, Args)]
struct RunQtrlwe2Args {
    #[arg(long)]
    spec: PathBuf,
    #[arg(long = "in")]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    /// Bootstrapping-key record (required: the window evaluator circuit-
    /// bootstraps its carried state bits).
    #[arg(long)]
    bkey: PathBuf,
    /// Window size q; the window is emitted as one output point.
    #[arg(long)]
    queue_size: usize,
    /// First-level look-up depth d1 (d2 = q - d1).
    #[arg(long, default_value_t = DEFAULT_FIRST_LUT_DEPTH)]
    first_lut_depth: usize,
    /// Alphabet width in atomic propositions; when given, the input
    /// length must be a multiple of it.
    #[arg(long)]
    ap: Option<usize>,
}

#[derive(Debug, Args)]
struct LtlArgs {
    #[arg(long)]
    formula: String,
    /// Number of atomic propositions (alphabet 2^ap).
    #[arg(long)]
    ap: usize,
    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
    /// External LTL-to-DFA translator command.
    #[arg(long, default_value = ltl::DEFAULT_TRANSLATOR)]
    translator: String,
    /// Minimize the automaton (applied after --reversed).
    #[arg(long)]
    minimized: bool,
    /// Reverse and determinize the automaton.
    #[arg(long)]
    reversed: bool,
    /// Complement the final set (applied last).
    #[arg(long)]
    negated: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_bootstrap_key(path: &PathBuf) -> anyhow::Result<BootstrapKey> {
    let bkey: BootstrapKey = ser::read_archive(path)?;
    if *bkey.parameters() != DEFAULT_PARAMETERS {
        return Err(Error::BadKey(
            "bootstrapping key was generated with a different parameter set".into(),
        )
        .into());
    }
    Ok(bkey)
}

fn check_alphabet_width(stream_len: usize, ap: Option<usize>) -> anyhow::Result<()> {
    if let Some(width) = ap {
        if width == 0 {
            return Err(Error::BadConfig("alphabet width must be nonzero".into()).into());
        }
        if stream_len % width != 0 {
            return Err(Error::BadInput(format!(
                "input of {stream_len} bits is not a multiple of the {width}-bit alphabet"
            ))
            .into());
        }
    }
    Ok(())
}

fn write_result(out: &PathBuf, runner: &Runner) -> anyhow::Result<()> {
    let result = runner
        .result()?
        .ok_or_else(|| Error::BadInput("evaluation produced no output point".into()))?;
    ser::write_acceptance(out, &result)?;
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Genkey { out } => {
            let started = Instant::now();
            let client_key = ClientKey::generate(DEFAULT_PARAMETERS);
            info!(elapsed = ?started.elapsed(), "generated secret key");
            ser::write_archive(out, &client_key)?;
        }
        Commands::Genbkey { key, out } => {
            let client_key: ClientKey = ser::read_archive(key)?;
            let started = Instant::now();
            let bkey = BootstrapKey::generate(&client_key);
            info!(elapsed = ?started.elapsed(), "generated bootstrapping key");
            ser::write_archive(out, &bkey)?;
        }
        Commands::Enc {
            key,
            input,
            out,
            ap,
        } => {
            let client_key: ClientKey = ser::read_archive(key)?;
            let bytes = std::fs::read(&input).with_context(|| format!("reading {input:?}"))?;
            let blob = client_key.encrypt_bytes(&bytes, ap)?;
            info!(bits = blob.len(), "encrypted input");
            ser::write_ciphertext_blob(out, &blob)?;
        }
        Commands::Dec { key, input } => {
            let client_key: ClientKey = ser::read_archive(key)?;
            let ciphertext = ser::read_acceptance(input)?;
            let result = client_key.decrypt_acceptance(&ciphertext);
            info!(result, "decrypted acceptance");
            println!("{result}");
        }
        Commands::RunOffline(args) => {
            let graph = Graph::from_spec(&args.spec)?.minimized();
            let mut stream = ReversedStream::from_file(&args.input)?;
            check_alphabet_width(stream.size(), args.ap)?;
            let bkey = args.bkey.as_ref().map(load_bootstrap_key).transpose()?;
            let gate_key = bkey.as_ref().map(|k| k.gate_key());
            let started = Instant::now();
            let mut runner = Runner::Offline(OfflineRunner::new(
                graph,
                stream.size(),
                DEFAULT_PARAMETERS,
                gate_key.as_ref(),
                args.interval,
            )?);
            runner.run_to_end(&mut stream, None)?;
            info!(elapsed = ?started.elapsed(), "offline evaluation done");
            write_result(&args.out, &runner)?;
        }
        Commands::RunQtrlwe(args) => {
            let graph = Graph::from_spec(&args.spec)?.minimized();
            let mut stream = ForwardStream::from_file(&args.input)?;
            check_alphabet_width(stream.size(), args.ap)?;
            let bkey = args.bkey.as_ref().map(load_bootstrap_key).transpose()?;
            let gate_key = bkey.as_ref().map(|k| k.gate_key());
            let started = Instant::now();
            let mut runner = Runner::Qtrlwe(QtrlweRunner::new(
                graph,
                DEFAULT_PARAMETERS,
                gate_key.as_ref(),
                args.interval,
            )?);
            runner.run_to_end(&mut stream, None)?;
            info!(elapsed = ?started.elapsed(), "qtrlwe evaluation done");
            write_result(&args.out, &runner)?;
        }
        Commands::RunReversed(args) => {
            let graph = Graph::from_spec(&args.spec)?.minimized();
            let mut stream = ForwardStream::from_file(&args.input)?;
            check_alphabet_width(stream.size(), args.ap)?;
            let bkey_path = args.bkey.as_ref().ok_or_else(|| {
                Error::BadKey("the reversed strategy requires --bkey".into())
            })?;
            let gate_key = load_bootstrap_key(bkey_path)?.gate_key();
            let started = Instant::now();
            let mut runner = Runner::Reversed(ReversedRunner::new(
                &graph,
                DEFAULT_PARAMETERS,
                &gate_key,
                args.interval,
            )?);
            runner.run_to_end(&mut stream, None)?;
            info!(elapsed = ?started.elapsed(), "reversed evaluation done");
            write_result(&args.out, &runner)?;
        }
        Commands::RunQtrlwe2(args) => {
            let graph = Graph::from_spec(&args.spec)?.minimized();
            let mut stream = ForwardStream::from_file(&args.input)?;
            check_alphabet_width(stream.size(), args.ap)?;
            let bkey = load_bootstrap_key(&args.bkey)?;
            let gate_key = bkey.gate_key();
            let circuit_key = bkey.circuit_key();
            let started = Instant::now();
            let mut runner = Runner::Qtrlwe2(Qtrlwe2Runner::new(
                graph,
                DEFAULT_PARAMETERS,
                &gate_key,
                &circuit_key,
                args.queue_size,
                args.first_lut_depth,
                None,
            )?);
            runner.run_to_end(&mut stream, None)?;
            info!(elapsed = ?started.elapsed(), "qtrlwe2 evaluation done");
            write_result(&args.out, &runner)?;
        }
        Commands::Ltl2spec(args) => {
            let graph = build_ltl_graph(&args)?;
            let mut buf = Vec::new();
            graph.dump(&mut buf)?;
            emit(&args.out, &buf)?;
        }
        Commands::Ltl2dot(args) => {
            let graph = build_ltl_graph(&args)?;
            let mut buf = Vec::new();
            graph.dump_dot(&mut buf)?;
            emit(&args.out, &buf)?;
        }
    }
    Ok(())
}

fn build_ltl_graph(args: &LtlArgs) -> anyhow::Result<Graph> {
    let mut graph = ltl::from_ltl_with(&args.formula, args.ap, &args.translator)?;
    if args.reversed {
        graph = graph.reversed();
    }
    if args.minimized {
        graph = graph.minimized();
    }
    if args.negated {
        graph = graph.negated();
    }
    Ok(graph)
}

fn emit(out: &Option<PathBuf>, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;
    match out {
        Some(path) => std::fs::write(path, bytes).with_context(|| format!("writing {path:?}"))?,
        None => std::io::stdout().write_all(bytes)?,
    }
    Ok(())
}
