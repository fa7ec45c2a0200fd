use clap::Parser;
use rc522emu::{Args, EmulatorCore, StopReason, load_script};
use tracing::info;

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let script = match load_script(&args) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("Failed to load script: {}", e);
            std::process::exit(2);
        }
    };

    let config = args.to_emulator_config();

    info!("=== Creating Emulator ===");
    let mut emulator = match EmulatorCore::new(config) {
        Ok(emu) => emu,
        Err(e) => {
            eprintln!("Failed to create emulator: {}", e);
            std::process::exit(2);
        }
    };

    info!("=== Replaying {} Sessions ===", script.len());
    let stop_reason = emulator.run_script(&script);

    info!("=== Replay Complete ===");
    info!("Stop reason: {:?}", stop_reason);
    info!("Sessions: {}", emulator.sessions());
    info!("Card UID: {:02X?}", emulator.card().uid());

    if args.dump_card {
        let image = emulator.card().image();
        for (block, data) in image.chunks(16).enumerate() {
            info!("Block {:2}: {:02X?}", block, data);
        }
    }

    let exit_code = match stop_reason {
        StopReason::Completed => {
            info!("PASS: All sessions matched");
            0
        }
        StopReason::Mismatch(count) => {
            eprintln!("{} of {} sessions did not match", count, script.len());
            1
        }
    };

    std::process::exit(exit_code);
}
