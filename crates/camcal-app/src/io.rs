use std::io::BufRead;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camcal_analysis::AnalysisError;
use camcal_analysis::synthetic::SyntheticFrameSource;
use camcal_types::{Event, SessionState};
use kanal::{AsyncReceiver, Sender};
use tokio_util::sync::CancellationToken;

use crate::controller::AppController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Event(Event),
    Quit,
}

/// Key bindings of the headless session
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    match trimmed {
        "" | "space" => Some(Command::Event(Event::PrimaryAction)),
        "b" => Some(Command::Event(Event::CancelAction)),
        "p" => Some(Command::Event(Event::ModalRequested)),
        "q" => Some(Command::Quit),
        _ => None,
    }
}

/// Reads stdin on a detached thread; a blocked read never holds up shutdown
pub fn spawn_stdin_reader(tx: Sender<Command>) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("camcal-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                    None => tracing::warn!("Unknown input {line:?}: space, b, p or q"),
                }
            }
            let _ = tx.send(Command::Quit);
        })?;
    Ok(())
}

/// Forwards input to the flow controller until quit
pub async fn command_loop(controller: Arc<AppController>, rx: AsyncReceiver<Command>) {
    while let Ok(command) = rx.recv().await {
        match command {
            Command::Quit => {
                tracing::info!("Quit requested");
                break;
            }
            Command::Event(event) => {
                if !controller.post_event(event) {
                    tracing::debug!(
                        "{:?} ignored in state {}",
                        event,
                        controller.current_state()
                    );
                }
            }
        }
    }
}

/// Feeds synthetic frames to the analysis pipeline while capturing
pub async fn frame_pump(
    controller: Arc<AppController>,
    fps: u32,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let video = &controller.config().video;
    let mut source = SyntheticFrameSource::new(video.width, video.height);
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / fps.max(1) as f64));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        if controller.current_state() != SessionState::Capturing {
            continue;
        }

        let frame = source.next_frame();
        match controller.session().process_frame(&frame.data) {
            Ok(_) => {}
            Err(AnalysisError::Stopped) => break,
            Err(e) => return Err(e.into()),
        }
    }

    tracing::debug!("Frame pump stopping");
    Ok(())
}

/// Logs state, flow status and upload status whenever they change
pub async fn status_watcher(
    controller: Arc<AppController>,
    interval: Duration,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut last_state = SessionState::NotStarted;
    let mut last_flow = String::new();
    let mut last_upload = String::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let state = controller.current_state();
        if state != last_state {
            tracing::info!("Session state: {}", state);
            last_state = state;
        }

        let flow = controller.flow_status();
        if flow != last_flow {
            if !flow.is_empty() {
                tracing::info!("{}", flow);
            }
            last_flow = flow;
        }

        if let Some(upload) = controller.upload_status(Instant::now()) {
            if upload.message != last_upload {
                if !upload.message.is_empty() {
                    tracing::info!("Upload: {} ({:?})", upload.message, upload.code);
                }
                last_upload = upload.message;
            }
        }
    }

    Ok(())
}
