//! Stored forms commands: list, show, delete, update, parse, export.

use std::path::Path;

use anyhow::bail;
use formbatch_forms::{FormsError, FormsManager};
use formbatch_protocol::FormPreview;
use formbatch_transfer::{FileHandle, check_selectable};

use crate::bridge::ClientBridge;
use crate::prompt;
use crate::render;

async fn open(path: &Path) -> anyhow::Result<FileHandle> {
    let handle = FileHandle::from_path(path).await?;
    check_selectable(&handle)?;
    Ok(handle)
}

pub async fn list(conn: &ClientBridge) -> anyhow::Result<()> {
    let list = FormsManager::new().list_all(conn).await?;
    if list.forms.is_empty() {
        println!("no stored forms");
        return Ok(());
    }
    for form in &list.forms {
        println!(
            "{:<38} {:<8} {:<8} {}",
            form.id, form.language, form.version, form.title
        );
    }
    println!("{} form(s)", list.forms.len());
    Ok(())
}

pub async fn show(conn: &ClientBridge, form_id: &str) -> anyhow::Result<()> {
    let details = FormsManager::new().get_by_id(conn, form_id).await?;
    println!("{}", render::preview(&FormPreview::from(&details)));
    if !details.form.created_at.is_empty() {
        println!("created {}", details.form.created_at);
    }
    for q in &details.questions {
        println!("  {:>3}. {}", q.order, q.title);
    }
    Ok(())
}

pub async fn delete(conn: &ClientBridge, form_id: &str) -> anyhow::Result<()> {
    let ack = FormsManager::new().delete_by_id(conn, form_id).await?;
    println!("{}", ack.message);
    Ok(())
}

pub async fn delete_all(conn: &ClientBridge, yes: bool) -> anyhow::Result<()> {
    if !yes {
        let mut input = prompt::stdin_lines();
        if !prompt::confirm(&mut input, "delete every stored form?").await? {
            println!("nothing deleted");
            return Ok(());
        }
    }
    let ack = FormsManager::new().delete_all(conn).await?;
    println!("{}", ack.message);
    Ok(())
}

pub async fn update(conn: &ClientBridge, form_id: &str, path: &Path) -> anyhow::Result<()> {
    let file = open(path).await?;
    match FormsManager::new().update_by_id(conn, form_id, &file).await {
        Ok(outcome) => {
            for p in &outcome.previews {
                println!("updated {}", render::preview(p));
            }
            if outcome.previews.is_empty() {
                println!("updated {form_id}");
            }
            Ok(())
        }
        Err(FormsError::Invalid(verdict)) => {
            println!("{}", render::verdict(&file.name, &verdict));
            bail!("{form_id} left unchanged");
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn parse(conn: &ClientBridge, path: &Path) -> anyhow::Result<()> {
    let file = open(path).await?;
    match FormsManager::new().parse_only(conn, &file).await {
        Ok(schema) => {
            println!("{}", render::preview(&FormPreview::from(&schema)));
            if let Some(meta) = &schema.metadata {
                println!("parsed in {:.2}s", meta.parse_time);
            }
            Ok(())
        }
        Err(failure) => {
            println!("{}", render::parse_failure(&failure));
            Err(failure.into())
        }
    }
}

pub async fn export(conn: &ClientBridge, form_id: Option<&str>, dir: &Path) -> anyhow::Result<()> {
    let manager = FormsManager::new();
    let Some(form_id) = form_id else {
        let report = manager.export_all(conn, dir).await?;
        for path in &report.written {
            println!("wrote {}", path.display());
        }
        for (id, error) in &report.failed {
            println!("failed {id}: {error}");
        }
        if !report.failed.is_empty() {
            bail!("{} form(s) could not be exported", report.failed.len());
        }
        return Ok(());
    };

    let path = manager.export_form(conn, form_id, dir).await?;
    println!("wrote {}", path.display());
    Ok(())
}
