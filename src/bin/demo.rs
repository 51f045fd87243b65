// Small command-line demo: load a drum preset and a bass line, play a few
// loops through the default output device, then exit.

use std::io::Write;
use std::time::Duration;

use nexusbeat::{Sequencer, TransportEvent};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let sequencer = Sequencer::start()?;
    sequencer.load_drum_preset("Four on the Floor")?;
    sequencer.load_bass_preset("Deep Pulse")?;
    sequencer.set_tempo(120);
    sequencer.set_reverb_mix(0.2);

    println!("playing four loops at 120 bpm...");
    sequencer.play();

    // 16 steps at 120 bpm is 2 s per loop
    let deadline = std::time::Instant::now() + Duration::from_secs(8);
    while std::time::Instant::now() < deadline {
        for event in sequencer.poll_events() {
            if let TransportEvent::StepChanged(Some(step)) = event {
                print!("\rstep {step:2}");
                let _ = std::io::stdout().flush();
            }
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    sequencer.pause();
    println!("\ndone");
    Ok(())
}
