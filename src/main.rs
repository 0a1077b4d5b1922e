use anyhow::Result;
use crossbeam::channel;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use stepstudio::audio::{AudioEvent, AudioStream, SampleBank, StudioCommand, StudioEngine, debug_log};
use stepstudio::studio::{Session, SoundLibrary, project};
use stepstudio::ui::TerminalUI;

fn print_help() {
    println!("Stepstudio - Terminal-based drum machine and step sequencer");
    println!();
    println!("USAGE:");
    println!("    stepstudio [OPTIONS] [PROJECT_DIR]");
    println!();
    println!("ARGS:");
    println!("    PROJECT_DIR     Directory holding sounds.toml, sample files, and");
    println!("                    the saved project (default: current directory)");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help      Print this help message");
    println!("    --debug         Enable debug logging");
    println!();
    println!("DESCRIPTION:");
    println!("    A 6-track, 16-step loop sequencer. Drop sounds from the library");
    println!("    onto the timeline, stack per-cell effects, and play the loop at");
    println!("    60-200 BPM. The project is saved next to its samples.");
    println!();
    println!("CONTROLS:");
    println!("    Tab    Switch pane (Library / Timeline / Effects)");
    println!("    ↑↓←→   Navigate within the focused pane");
    println!("    Enter  Grab a library sound, drop or select a cell,");
    println!("           toggle an effect");
    println!("    G      Grab the cell under the cursor to move it");
    println!("    X      Remove the cell under the cursor");
    println!("    Esc    Cancel a grab");
    println!("    P      Preview the highlighted library sound");
    println!("    Space  Play/stop the loop");
    println!("    +/-    Adjust BPM (while stopped)");
    println!("    U      Undo the last placement edit");
    println!("    C      Clear the whole timeline (asks first)");
    println!("    S      Save the project");
    println!("    Q      Quit");
    println!();
    println!("EXAMPLES:");
    println!("    stepstudio                   # Use the current directory");
    println!("    stepstudio ~/beats/demo      # Open a project directory");
    println!("    stepstudio --debug           # Log engine activity to debug.log");
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help();
        return Ok(());
    }

    let debug_mode = args.contains(&"--debug".to_string());
    let project_dir: PathBuf = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with('-'))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    if debug_mode {
        println!("Starting Stepstudio in DEBUG mode...");
    } else {
        println!("Starting Stepstudio...");
    }

    let library = SoundLibrary::load_or_builtin(&project_dir)?;

    // Open the output device first; everything downstream decodes and runs
    // at its native rate.
    let audio_stream = AudioStream::new(debug_mode)?;
    let sample_rate = audio_stream.sample_rate();
    if debug_mode {
        println!(
            "Output: {} at {}Hz",
            audio_stream.device_name(),
            sample_rate
        );
    }

    let mut bank = SampleBank::new(sample_rate);
    let (loaded, failed) = bank.load_library(&library, &project_dir, |msg| {
        eprintln!("Warning: {}", msg);
        debug_log(debug_mode, msg);
    });
    println!("Loaded {} of {} sounds.", loaded, loaded + failed);

    let session = match project::load(&project_dir) {
        Some(file) => file.restore(),
        None => Session::new(),
    };
    let session = Arc::new(Mutex::new(session));

    let (command_sender, command_receiver) = channel::unbounded::<StudioCommand>();
    let (event_sender, event_receiver) = channel::unbounded::<AudioEvent>();

    let engine = StudioEngine::new(
        Arc::clone(&session),
        bank,
        sample_rate,
        command_receiver,
        event_sender.clone(),
        debug_mode,
    );

    // Keep the stream handle alive for the life of the UI; dropping it
    // tears the callback (and the engine inside it) down.
    let _stream = audio_stream.start(engine, event_sender, debug_mode)?;

    let mut ui = TerminalUI::new(
        Arc::clone(&session),
        library,
        project_dir.clone(),
        command_sender,
        event_receiver,
    )
    .map_err(|e| anyhow::anyhow!("UI creation failed: {}", e))?;
    ui.run()
        .map_err(|e| anyhow::anyhow!("UI run failed: {}", e))?;
    drop(ui);

    // Save on the way out so a quit never loses the timeline.
    if let Ok(session) = session.lock() {
        if let Err(e) = project::save(&project_dir, &session) {
            eprintln!("Warning: could not save project: {}", e);
        }
    }

    println!("Stepstudio stopped.");
    Ok(())
}
