use std::io::Write;

use anyhow::Context;
use colored::Colorize;
use lyra_sdk::{
    ChangeType, DiffKind, FileDescriptor, MergeOutcome, RollbackMode, Vault, VaultConfig, Version,
};
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => VaultConfig::at(&cli.root),
    };
    let vault = Vault::open(config).context("opening vault")?;
    let format = cli.format;

    match cli.command {
        Command::Track(args) => cmd_track(&vault, args),
        Command::Untrack(args) => cmd_untrack(&vault, args),
        Command::Put(args) => cmd_put(&vault, &format, args),
        Command::Log(args) if args.changes => cmd_log_changes(&vault, &format, args),
        Command::Log(args) => cmd_log(&vault, &format, args),
        Command::Search(args) => cmd_search(&vault, &format, args),
        Command::Cat(args) => cmd_cat(&vault, args),
        Command::Diff(args) => cmd_diff(&vault, &format, args),
        Command::Rollback(args) => cmd_rollback(&vault, &format, args),
        Command::Rm(args) => cmd_rm(&vault, args),
        Command::Cleanup(args) => cmd_cleanup(&vault, &format, args),
        Command::Optimize(args) => cmd_optimize(&vault, &format, args),
        Command::Sweep => cmd_sweep(&vault, &format),
        Command::Verify(args) => cmd_verify(&vault, &format, args),
        Command::Merge(args) => cmd_merge(&vault, args),
        Command::Stats(args) => cmd_stats(&vault, &format, args),
        Command::ServeCleanup => cmd_serve_cleanup(&vault),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_version(version: &Version) {
    println!(
        "{}  {}  {}  {}",
        format!("v{}", version.number).yellow().bold(),
        version.hash.short_hex().dimmed(),
        version.human_size(),
        version.created_at.format("%Y-%m-%d %H:%M:%S"),
    );
    println!("  Author: {}", version.created_by);
    if let Some(comment) = &version.comment {
        println!("  {comment}");
    }
}

fn cmd_track(vault: &Vault, args: TrackArgs) -> anyhow::Result<()> {
    let mut descriptor = FileDescriptor::new(&args.name);
    if let Some(mime) = args.mime {
        descriptor = descriptor.with_mime_type(mime);
    }
    vault.track(args.file, descriptor)?;
    println!("{} Tracking file {} as {}", "✓".green().bold(), args.file, args.name.bold());
    Ok(())
}

fn cmd_untrack(vault: &Vault, args: FileArgs) -> anyhow::Result<()> {
    if vault.untrack(args.file)? {
        println!("Untracked file {}. Run {} to reclaim its content.", args.file, "sweep".bold());
    } else {
        println!("File {} was not tracked.", args.file);
    }
    Ok(())
}

fn cmd_put(vault: &Vault, format: &OutputFormat, args: PutArgs) -> anyhow::Result<()> {
    let version = vault
        .put_file(args.file, &args.path, args.message.as_deref(), &args.author)
        .with_context(|| format!("storing {}", args.path.display()))?;
    match format {
        OutputFormat::Json => print_json(&version),
        OutputFormat::Text => {
            println!(
                "{} Stored version {} of file {} ({})",
                "✓".green().bold(),
                version.number.to_string().yellow(),
                args.file,
                version.human_size()
            );
            Ok(())
        }
    }
}

fn cmd_log(vault: &Vault, format: &OutputFormat, args: LogArgs) -> anyhow::Result<()> {
    let history: Vec<Version> = vault.history(args.file)?.into_iter().take(args.limit).collect();
    match format {
        OutputFormat::Json => print_json(&history),
        OutputFormat::Text => {
            if history.is_empty() {
                println!("File {} has no versions.", args.file);
            }
            for version in &history {
                print_version(version);
            }
            Ok(())
        }
    }
}

fn cmd_log_changes(vault: &Vault, format: &OutputFormat, args: LogArgs) -> anyhow::Result<()> {
    let entries = vault.change_history(args.file, Some(args.limit))?;
    if let OutputFormat::Json = format {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("File {} has no versions.", args.file);
    }
    for entry in &entries {
        let kind = match entry.change_type {
            ChangeType::Created => "created".green(),
            ChangeType::Grown => "grown".cyan(),
            ChangeType::Shrunk => "shrunk".magenta(),
            ChangeType::Modified => "modified".normal(),
        };
        println!(
            "{}  {:<8}  {}  similarity {:.1}%",
            format!("v{}", entry.version.number).yellow().bold(),
            kind,
            entry.summary,
            entry.similarity * 100.0
        );
    }
    Ok(())
}

fn cmd_search(vault: &Vault, format: &OutputFormat, args: SearchArgs) -> anyhow::Result<()> {
    let found = vault.search_content(args.file, &args.pattern, args.regex)?;
    if let OutputFormat::Json = format {
        return print_json(&found);
    }
    for version in &found {
        print_version(version);
    }
    println!("{} versions match", found.len());
    Ok(())
}

fn cmd_cat(vault: &Vault, args: CatArgs) -> anyhow::Result<()> {
    let content = match args.version {
        Some(number) => vault.content(args.file, number)?,
        None => vault.latest_content(args.file)?,
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_diff(vault: &Vault, format: &OutputFormat, args: DiffArgs) -> anyhow::Result<()> {
    let diff = vault.diff(args.file, args.from, args.to)?;
    if let OutputFormat::Json = format {
        return print_json(&diff);
    }
    match diff.kind {
        DiffKind::Text => {
            for line in diff.unified.lines() {
                if line.starts_with("+++") || line.starts_with("---") {
                    println!("{}", line.bold());
                } else if line.starts_with('+') {
                    println!("{}", line.green());
                } else if line.starts_with('-') {
                    println!("{}", line.red());
                } else if line.starts_with("@@") {
                    println!("{}", line.cyan());
                } else {
                    println!("{line}");
                }
            }
            println!(
                "{} added, {} deleted, {} modified, similarity {:.1}%",
                diff.added.to_string().green(),
                diff.deleted.to_string().red(),
                diff.modified.to_string().yellow(),
                diff.similarity * 100.0
            );
        }
        DiffKind::Binary | DiffKind::Unsupported => {
            println!("{}", diff.summary.unwrap_or_default());
        }
    }
    Ok(())
}

fn cmd_rollback(vault: &Vault, format: &OutputFormat, args: RollbackArgs) -> anyhow::Result<()> {
    let mode = if args.in_place {
        RollbackMode::InPlace
    } else {
        RollbackMode::NewVersion
    };
    let version = vault.rollback(args.file, args.version, mode, &args.author)?;
    match format {
        OutputFormat::Json => print_json(&version),
        OutputFormat::Text => {
            match mode {
                RollbackMode::NewVersion => println!(
                    "{} Rolled back to version {} as version {}",
                    "✓".green().bold(),
                    args.version,
                    version.number.to_string().yellow()
                ),
                RollbackMode::InPlace => println!(
                    "{} Current version of file {} is now {}",
                    "✓".green().bold(),
                    args.file,
                    version.number.to_string().yellow()
                ),
            }
            Ok(())
        }
    }
}

fn cmd_rm(vault: &Vault, args: RmArgs) -> anyhow::Result<()> {
    if vault.delete_version(args.file, args.version)? {
        println!("{} Deleted version {} of file {}", "✓".green().bold(), args.version, args.file);
    } else {
        println!(
            "{} Version {} of file {} was not deleted (missing, or the only version)",
            "!".yellow().bold(),
            args.version,
            args.file
        );
    }
    Ok(())
}

fn cmd_cleanup(vault: &Vault, format: &OutputFormat, args: CleanupArgs) -> anyhow::Result<()> {
    let batch = match args.file {
        Some(file) => {
            let report = vault.cleanup(file)?;
            if let OutputFormat::Json = format {
                return print_json(&report);
            }
            println!(
                "{} File {}: {} of {} versions deleted, {} bytes freed",
                "✓".green().bold(),
                file,
                report.versions_deleted,
                report.versions_examined,
                report.bytes_freed
            );
            for error in &report.errors {
                println!("  {} {error}", "error:".red());
            }
            return Ok(());
        }
        None => vault.cleanup_all()?,
    };
    if let OutputFormat::Json = format {
        return print_json(&batch);
    }
    for (file, report) in &batch.reports {
        println!(
            "  File {}: {} deleted {:?}",
            file, report.versions_deleted, report.deleted_numbers
        );
    }
    for (file, reason) in &batch.failures {
        println!("  {} file {file}: {reason}", "error:".red());
    }
    println!(
        "{} {} versions deleted, {} bytes freed",
        "✓".green().bold(),
        batch.versions_deleted(),
        batch.bytes_freed()
    );
    Ok(())
}

fn cmd_optimize(vault: &Vault, format: &OutputFormat, args: FileArgs) -> anyhow::Result<()> {
    let report = vault.optimize_storage(args.file)?;
    if let OutputFormat::Json = format {
        return print_json(&report);
    }
    println!(
        "{} File {}: {} duplicate versions deleted {:?}",
        "✓".green().bold(),
        args.file,
        report.versions_deleted,
        report.deleted_numbers
    );
    for error in &report.errors {
        println!("  {} {error}", "error:".red());
    }
    Ok(())
}

fn cmd_sweep(vault: &Vault, format: &OutputFormat) -> anyhow::Result<()> {
    let report = vault.sweep()?;
    let staging = vault.cleanup_staging()?;
    if let OutputFormat::Json = format {
        return print_json(&report);
    }
    println!(
        "{} Sweep: {} orphaned versions, {} blobs removed, {} bytes freed, {} staging files",
        "✓".green().bold(),
        report.orphaned_versions,
        report.orphaned_blobs,
        report.bytes_freed,
        staging
    );
    for error in &report.errors {
        println!("  {} {error}", "error:".red());
    }
    Ok(())
}

fn cmd_verify(vault: &Vault, format: &OutputFormat, args: FileArgs) -> anyhow::Result<()> {
    let results = vault.verify(args.file)?;
    if let OutputFormat::Json = format {
        return print_json(&results);
    }
    let failed = results.values().filter(|ok| !**ok).count();
    for (number, ok) in &results {
        let status = if *ok { "ok".green() } else { "CORRUPT".red().bold() };
        println!("  v{number}: {status}");
    }
    if failed == 0 {
        println!("{} {} versions verified", "✓".green().bold(), results.len());
        Ok(())
    } else {
        anyhow::bail!("{failed} of {} versions failed verification", results.len())
    }
}

fn cmd_merge(vault: &Vault, args: MergeArgs) -> anyhow::Result<()> {
    let outcome = vault.merge(args.file, args.base, args.ours, args.theirs)?;
    match &outcome {
        MergeOutcome::Clean(_) if args.commit => {
            let version = vault.commit_merge(args.file, &outcome, None, &args.author)?;
            println!(
                "{} Merged cleanly as version {}",
                "✓".green().bold(),
                version.number.to_string().yellow()
            );
        }
        MergeOutcome::Clean(content) => print!("{content}"),
        MergeOutcome::Conflicted(content) => {
            print!("{content}");
            eprintln!("{} merge has conflicts", "!".yellow().bold());
        }
    }
    Ok(())
}

fn cmd_stats(vault: &Vault, format: &OutputFormat, args: FileArgs) -> anyhow::Result<()> {
    let stats = vault.statistics(args.file)?;
    if let OutputFormat::Json = format {
        return print_json(&stats);
    }
    println!("File {}", args.file.to_string().bold());
    println!("  Versions: {}", stats.total_versions);
    println!("  Latest: {}", stats.max_version_number.map_or("-".into(), |n| format!("v{n}")));
    println!("  Total bytes: {}", stats.total_bytes);
    println!("  Unique bytes: {}", stats.unique_bytes);
    println!("  Average size: {}", stats.average_size);
    println!("  Dedup ratio: {:.2}", stats.dedup_ratio);
    Ok(())
}

fn cmd_serve_cleanup(vault: &Vault) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let handle = vault.schedule_cleanup()?;
        println!(
            "Cleanup scheduled every {}s. Press Ctrl-C to stop.",
            vault.config().cleanup_interval.as_secs()
        );
        tokio::signal::ctrl_c().await?;
        handle.shutdown().await;
        anyhow::Ok(())
    })
}
