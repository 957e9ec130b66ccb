use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uci::MoveToken;
use uci_match::config::MatchConfig;
use uci_match::orchestrator::Match;
use uci_match::report::{self, MatchReport};
use uci_match::session::UciSession;

#[derive(Parser)]
#[command(name = "uci-match")]
#[command(about = "Play UCI chess engines against each other")]
struct Cli {
    /// Engine configuration file
    #[arg(short, long, default_value = "match.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play matches between two engines
    Play {
        /// First engine (configured name or executable)
        first: String,
        /// Second engine (configured name or executable)
        second: String,
        /// Number of matches to play
        #[arg(short, long, default_value = "1")]
        games: u32,
        /// Directory for JSON match reports
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Ask one engine for its move in a position
    Search {
        /// Engine (configured name or executable)
        engine: String,
        /// Position in FEN instead of the start position
        #[arg(long, conflicts_with = "moves")]
        fen: Option<String>,
        /// Search a fixed node count and print the raw engine output
        #[arg(long)]
        nodes: Option<u64>,
        /// Print every parsed info line as JSON
        #[arg(long, conflicts_with = "nodes")]
        progress: bool,
        /// Moves played from the start position
        moves: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = MatchConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Play {
            first,
            second,
            games,
            out_dir,
        } => play(&config, &first, &second, games, out_dir.as_deref()),
        Commands::Search {
            engine,
            fen,
            nodes,
            progress,
            moves,
        } => search(&config, &engine, fen.as_deref(), &moves, nodes, progress),
    }
}

fn start_session(config: &MatchConfig, name: &str) -> anyhow::Result<UciSession> {
    let engine = config.resolve(name);
    let session = UciSession::start(&engine.path, engine.session_config(name)?)
        .with_context(|| format!("Failed to start engine {}", name))?;
    for rejected in session.rejected_options() {
        tracing::warn!(
            "{} rejected option {} = {}",
            name,
            rejected.name,
            rejected.value
        );
    }
    Ok(session)
}

fn play(
    config: &MatchConfig,
    first: &str,
    second: &str,
    games: u32,
    out_dir: Option<&Path>,
) -> anyhow::Result<()> {
    if first == second {
        bail!("Both engines are named {}; give them distinct names", first);
    }
    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    println!("Running {} games: {} vs {}", games, first, second);

    let mut rng = rand::rng();
    let mut wins: BTreeMap<&str, u32> = BTreeMap::new();
    let mut draws = 0;

    for i in 1..=games {
        let mut engines = BTreeMap::new();
        engines.insert(first.to_string(), start_session(config, first)?);
        engines.insert(second.to_string(), start_session(config, second)?);

        let mut game = Match::new(engines, &mut rng)?;
        match game.run() {
            Ok(Some(winner)) => {
                let key = if winner == first { first } else { second };
                *wins.entry(key).or_default() += 1;
                println!(
                    "Game {}: {} (white) vs {} (black): {} wins after {} plies",
                    i,
                    game.white(),
                    game.black(),
                    winner,
                    game.moves().len()
                );
            }
            Ok(None) => {
                draws += 1;
                println!(
                    "Game {}: {} (white) vs {} (black): draw after {} plies",
                    i,
                    game.white(),
                    game.black(),
                    game.moves().len()
                );
            }
            Err(e) => tracing::error!("Game {} error: {}", i, e),
        }

        if let Some(dir) = out_dir {
            let path = dir.join(format!("game-{}.json", i));
            if let Err(e) = report::write_json(&path, &MatchReport::from_match(&game)) {
                tracing::warn!("Failed to write {}: {}", path.display(), e);
            }
        }

        let (white, black) = game.into_sessions();
        for session in [white, black] {
            let name = session.name().to_string();
            if let Err(e) = session.quit() {
                tracing::debug!("{} did not take quit: {}", name, e);
            }
        }
    }

    println!(
        "\nResults: {} {} / {} {} / draws {}",
        first,
        wins.get(first).copied().unwrap_or(0),
        second,
        wins.get(second).copied().unwrap_or(0),
        draws
    );
    Ok(())
}

fn search(
    config: &MatchConfig,
    name: &str,
    fen: Option<&str>,
    moves: &[String],
    nodes: Option<u64>,
    progress: bool,
) -> anyhow::Result<()> {
    let mut session = start_session(config, name)?;
    session.new_game()?;

    match fen {
        Some(fen) => {
            if let Some(eval) = session.set_position_fen(fen)? {
                println!(
                    "static eval: white {} black {} phase {}",
                    eval.white, eval.black, eval.phase
                );
            }
        }
        None => {
            let moves = moves
                .iter()
                .map(|m| MoveToken::parse(m))
                .collect::<Result<Vec<_>, _>>()?;
            session.set_position(&moves)?;
        }
    }

    if let Some(nodes) = nodes {
        session.go_nodes(nodes)?;
        for line in session.capture_full_text()? {
            println!("{}", line);
        }
    } else if progress {
        let result = session.search_with_progress()?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let result = session.best_move()?;
        match result.score {
            Some(score) => println!("bestmove {} score {}", result.best_move, score),
            None => println!("bestmove {}", result.best_move),
        }
    }

    session.quit()?;
    Ok(())
}
