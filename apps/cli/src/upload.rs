//! `validate`, `upload` and `recover` commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use formbatch_transfer::FileHandle;
use formbatch_upload::{
    JsonFileStore, Selection, UploadEvent, UploadOrchestrator, UploadSummary, Validator,
};
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::ClientBridge;
use crate::config::CliConfig;
use crate::prompt::{self, Control};
use crate::render;

/// Reads the given paths into a selection, reporting what was skipped.
async fn select(paths: &[PathBuf]) -> anyhow::Result<Selection> {
    let mut handles = Vec::with_capacity(paths.len());
    for path in paths {
        match FileHandle::from_path(path).await {
            Ok(handle) => handles.push(handle),
            Err(e) => eprintln!("skipping {}: {e}", path.display()),
        }
    }

    let mut selection = Selection::new();
    for rejected in selection.add(handles) {
        eprintln!("skipping {rejected}");
    }
    if selection.is_empty() {
        bail!("no spreadsheet selected");
    }
    Ok(selection)
}

/// Validates the whole selection and prints one verdict per file.
async fn check(bridge: &Arc<ClientBridge>, selection: &mut Selection) -> bool {
    let validator = Validator::new(Arc::clone(bridge) as Arc<dyn formbatch_upload::FormsConnection>);
    let all_valid = validator.validate_all(selection).await;

    for file in selection.files().iter() {
        if let Some(verdict) = selection.verdict(file.id) {
            println!("{}", render::verdict(&file.name, verdict));
        }
    }
    all_valid
}

fn orchestrator(bridge: Arc<ClientBridge>, config: &CliConfig) -> anyhow::Result<UploadOrchestrator> {
    let dir = config.session_dir()?;
    debug!(dir = %dir.display(), "session directory");
    Ok(UploadOrchestrator::new(
        bridge,
        JsonFileStore::new(dir),
        config.upload_settings(),
    ))
}

pub async fn validate(bridge: Arc<ClientBridge>, paths: &[PathBuf]) -> anyhow::Result<()> {
    let mut selection = select(paths).await?;
    if !check(&bridge, &mut selection).await {
        bail!("validation failed");
    }
    println!("all {} file(s) valid", selection.len());
    Ok(())
}

pub async fn upload(
    bridge: Arc<ClientBridge>,
    config: &CliConfig,
    paths: &[PathBuf],
) -> anyhow::Result<()> {
    let mut input = prompt::stdin_lines();
    let mut orch = orchestrator(Arc::clone(&bridge), config)?;
    let mut events = orch.take_events().context("upload events already taken")?;

    // Starting a batch replaces any interrupted session on disk.
    if let Some(notice) = orch.restore() {
        println!("an interrupted upload exists: {notice}");
        if !prompt::confirm(&mut input, "discard it and start a new upload?").await? {
            bail!("kept the interrupted upload; continue it with `formbatch recover --resume`");
        }
        orch.cancel().await?;
        while events.try_recv().is_ok() {}
    }

    let mut selection = select(paths).await?;
    if !check(&bridge, &mut selection).await {
        bail!("every file must pass validation before upload");
    }

    orch.start(&selection)?;
    println!("controls: p pause, r resume, c cancel, s status");
    finish(control(&orch, &mut events, &selection, &mut input).await?)
}

pub async fn recover(
    bridge: Arc<ClientBridge>,
    config: &CliConfig,
    resume: bool,
) -> anyhow::Result<()> {
    let mut orch = orchestrator(bridge, config)?;
    let mut events = orch.take_events().context("upload events already taken")?;

    let Some(notice) = orch.restore() else {
        println!("no interrupted upload");
        return Ok(());
    };
    let selection = Selection::new();

    if notice.unavailable > 0 {
        println!(
            "{} remaining file(s) were not read from disk and will fail",
            notice.unavailable
        );
    }

    if !resume {
        while let Ok(event) = events.try_recv() {
            if let Some(line) = render::event(&event) {
                println!("{line}");
            }
        }
        println!("{}", render::status(&orch.status(&selection)));
        println!("continue it with `formbatch recover --resume`");
        return Ok(());
    }

    let mut input = prompt::stdin_lines();
    orch.resume()?;
    println!("controls: p pause, r resume, c cancel, s status");
    finish(control(&orch, &mut events, &selection, &mut input).await?)
}

fn finish(summary: Option<UploadSummary>) -> anyhow::Result<()> {
    match summary {
        Some(s) if s.failed > 0 => bail!("{} of {} file(s) failed", s.failed, s.total),
        _ => Ok(()),
    }
}

/// Prints events and applies keyboard controls until the batch completes
/// or is cancelled. Returns the summary of a completed batch.
///
/// Events queue up while a prompt waits for an answer; none are lost.
async fn control<R>(
    orch: &UploadOrchestrator,
    events: &mut mpsc::UnboundedReceiver<UploadEvent>,
    selection: &Selection,
    input: &mut Lines<R>,
) -> anyhow::Result<Option<UploadSummary>>
where
    R: AsyncBufRead + Unpin,
{
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(None);
                };
                if let Some(line) = render::event(&event) {
                    println!("{line}");
                }
                match event {
                    UploadEvent::Completed(summary) => {
                        // The forms list is reloaded before the driver exits.
                        orch.join().await;
                        while let Ok(event) = events.try_recv() {
                            if let Some(line) = render::event(&event) {
                                println!("{line}");
                            }
                        }
                        return Ok(Some(summary));
                    }
                    UploadEvent::Cancelled { .. } => return Ok(None),
                    _ => {}
                }
            }
            line = input.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    debug!("stdin closed, controls disabled");
                    stdin_open = false;
                    continue;
                };
                let result = match Control::parse(&line) {
                    Some(Control::Pause) => orch.pause(),
                    Some(Control::Resume) => orch.resume(),
                    Some(Control::Cancel) => {
                        if prompt::confirm(input, "cancel the upload?").await? {
                            orch.cancel().await
                        } else {
                            Ok(())
                        }
                    }
                    Some(Control::Status) => {
                        println!("{}", render::status(&orch.status(selection)));
                        Ok(())
                    }
                    None if line.trim().is_empty() => Ok(()),
                    None => {
                        println!("unknown control {:?} (p, r, c, s)", line.trim());
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    warn!(error = %e, "control rejected");
                    println!("{e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    use formbatch_protocol::{Request, Response, ValidationVerdict};
    use formbatch_transfer::XLSX_MIME;
    use formbatch_upload::{FormsConnection, MemoryStore, UploadError, UploadSettings};
    use tokio::io::{AsyncBufReadExt, BufReader};

    struct OkConn;

    impl FormsConnection for OkConn {
        fn send_request(
            &self,
            request: Request,
        ) -> Pin<Box<dyn Future<Output = Result<Response, UploadError>> + Send + '_>> {
            Box::pin(async move {
                let body = match request.endpoint {
                    formbatch_protocol::Endpoint::ListForms => r#"{"forms":[],"count":0}"#,
                    _ => r#"{"form":{"id":"x","title":"T"}}"#,
                };
                Ok(Response::new(200, body))
            })
        }
    }

    fn validated(n: usize) -> Selection {
        let mut sel = Selection::new();
        sel.add((0..n).map(|i| FileHandle::from_bytes(format!("f{i}.xlsx"), XLSX_MIME, vec![1u8])));
        let ids: Vec<_> = sel.files().iter().map(|f| f.id).collect();
        for id in ids {
            sel.record(
                id,
                ValidationVerdict {
                    valid: true,
                    message: "ok".into(),
                    errors: vec![],
                    warnings: vec![],
                    metadata: None,
                },
            );
        }
        sel.recompute_all_valid();
        sel
    }

    #[tokio::test]
    async fn control_ends_after_the_consumer_falls_behind() {
        let mut orch =
            UploadOrchestrator::new(Arc::new(OkConn), MemoryStore::new(), UploadSettings::default());
        let mut events = orch.take_events().unwrap();
        let sel = validated(300);
        orch.start(&sel).unwrap();
        // Nothing reads events until the batch is over.
        orch.join().await;

        // A declined cancel prompt, then end of input.
        let mut input = BufReader::new(&b"c\nn\n"[..]).lines();
        let summary = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            control(&orch, &mut events, &sel, &mut input),
        )
        .await
        .expect("control loop never ended")
        .unwrap()
        .expect("completed summary");

        assert_eq!((summary.total, summary.succeeded, summary.failed), (300, 300, 0));
    }

    #[test]
    fn finish_fails_when_files_failed() {
        let ok = UploadSummary {
            total: 2,
            succeeded: 2,
            ..UploadSummary::default()
        };
        assert!(finish(Some(ok)).is_ok());
        assert!(finish(None).is_ok());

        let bad = UploadSummary {
            total: 2,
            succeeded: 1,
            failed: 1,
            failures: Vec::new(),
        };
        assert!(finish(Some(bad)).is_err());
    }
}
