//! Headless CLI driver for the 56 Cards client library: connects, registers,
//! joins the stored table and relays intents typed on stdin. Useful for
//! exercising a server without any rendering layer.

use anyhow::Result;
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use cards56_client::{
    FileParamStore, GameController, GameEvent, LoginParams, LoginParamsPatch,
};
use cards56_protocol::Card;

#[derive(Parser, Debug)]
#[command(name = "cards56", about = "Headless 56 Cards client")]
struct Args {
    /// Hub endpoint.
    #[arg(long, default_value = "ws://localhost:8080/Cards56Hub")]
    url: String,

    /// Display name; defaults to the last one used.
    #[arg(long)]
    name: Option<String>,

    /// Table type: 0 = 4 seats, 1 = 6 seats, 2 = 8 seats.
    #[arg(long)]
    table_type: Option<String>,

    /// Private table name; empty joins a public table.
    #[arg(long)]
    table_name: Option<String>,

    /// Interface language code.
    #[arg(long)]
    lang: Option<String>,

    /// Watch instead of playing.
    #[arg(long)]
    watch: Option<bool>,

    /// Where login parameters are persisted.
    #[arg(long, default_value = ".cards56")]
    data_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let store = Arc::new(FileParamStore::new(&args.data_dir));

    // Fold command-line overrides into the stored login parameters before
    // the controller reads them.
    let current = LoginParams::create(store.as_ref());
    let patch = LoginParamsPatch {
        user_name: args.name,
        table_type: args.table_type,
        table_name: args.table_name,
        language: args.lang,
        watch: args.watch,
    };
    LoginParams::update(&current, patch, store.as_ref());

    let controller = GameController::new(&args.url, store)?;
    println!("connecting to {}...", args.url);
    controller.connect().await?;

    let observer = controller.clone();
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&observer, event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("commands: bid <n> | pass | trump <card> | play <card> | show | next | refresh | forfeit | state | quit");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        if let Err(err) = run_command(&controller, line).await {
            eprintln!("error: {err}");
        }
    }

    controller.disconnect().await;
    Ok(())
}

async fn run_command(controller: &GameController, line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    let arg = parts.next();

    match (command, arg) {
        ("bid", Some(amount)) => controller.place_bid(amount.parse()?).await?,
        ("pass", _) => controller.pass_bid().await?,
        ("trump", Some(code)) => {
            let card = Card::from_str(code)?;
            controller.select_trump(&card.code()).await?;
        }
        ("play", Some(code)) => {
            let card = Card::from_str(code)?;
            controller.play_card(&card.code(), 2_000).await?;
        }
        ("show", _) => controller.show_trump(2_000).await?,
        ("next", _) => controller.start_next_game().await?,
        ("refresh", _) => controller.refresh_state().await?,
        ("forfeit", _) => controller.forfeit_game().await?,
        ("state", _) => print_state(controller),
        _ => eprintln!("unknown command: {line}"),
    }
    Ok(())
}

fn print_event(controller: &GameController, event: GameEvent) {
    match event {
        GameEvent::Connection { state, attempt } => {
            if attempt > 0 {
                println!("[connection] {state} (attempt {attempt})");
            } else {
                println!("[connection] {state}");
            }
        }
        GameEvent::Registered(player) => {
            if player.table_name.is_empty() {
                println!("[registered] {} — joining a table...", player.player_id);
            } else {
                println!("[registered] {} at {}", player.player_id, player.table_name);
            }
        }
        GameEvent::ServerError(err) => {
            eprintln!("[server error] {} ({})", err.message, err.method);
        }
        GameEvent::StateApplied { changes } => {
            if changes.any() {
                print_state(controller);
            }
        }
    }
}

fn print_state(controller: &GameController) {
    let table = controller.table_meta();
    let player = controller.local_player();
    let progress = controller.game_progress();
    let bidding = controller.bidding();
    let history = controller.play_history();

    println!(
        "table {:?} ({} seats)  stage: {}",
        table.table_name, table.max_players, progress.stage
    );
    if player.seat_position >= 0 {
        println!(
            "you: {} (seat {}, team {})  hand: {}",
            player.display_name,
            player.seat_position,
            player.home_team(),
            player.hand_cards.join(" ")
        );
    }
    if bidding.high_bid > 0 {
        println!(
            "high bid {} by seat {}; next: seat {} (min {})",
            bidding.high_bid, bidding.high_bidder, bidding.next_bidder, bidding.next_min_bid
        );
    }
    let round = history.current_round();
    if !round.played_cards.is_empty() {
        println!(
            "on the table: {}  (next: seat {})",
            round.played_cards.join(" "),
            round.next_player_seat
        );
    }
    let teams = progress.teams;
    if teams[0].score_needed > 0 || teams[1].score_needed > 0 {
        println!(
            "score: team0 {}/{}  team1 {}/{}",
            teams[0].current_score, teams[0].score_needed,
            teams[1].current_score, teams[1].score_needed
        );
    }
}
