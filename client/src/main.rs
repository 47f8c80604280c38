use clap::Parser;
use client::input::InputManager;
use client::model::{ClientBoard, Status};
use client::network::Controller;
use client::rendering::Renderer;
use log::info;
use macroquad::prelude::*;
use macroquad::window::Conf;
use shared::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "600")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "640")]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Concentration".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    info!("Controls: click a card to reveal it, Escape to quit");

    let mut controller = Controller::start(args.server);
    let mut board = ClientBoard::new();
    let mut input = InputManager::new();
    let mut renderer = Renderer::new();
    let mut announced_end = false;

    loop {
        for event in controller.poll_events() {
            board.apply(&event);
        }

        if board.status() == Status::GameOver && !announced_end {
            info!("Game over in {} moves", board.moves());
            announced_end = true;
        }

        renderer.update_layout(board.dimension());

        if let Some(position) = input.update(renderer.layout()) {
            if board.is_valid(position.row, position.col) && controller.request_reveal(position) {
                board.note_request();
            }
        }

        renderer.render(&board);

        if input.quit_requested() {
            break;
        }

        next_frame().await;
    }
}
