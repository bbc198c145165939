use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use content_parser::{parse_buffer, parse_edit, parse_line, render_entry};
use editor::{ENTRY_TEMPLATE, compose};
use error::Error;
use store::{ALL, Query, SortKey, TaskPatch, TaskStore};
use task::Priority;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Configuration;

mod config;
mod content_parser;
mod csv_format;
mod editor;
mod error;
mod list_ui;
mod storage;
mod store;
mod task;

#[derive(Parser)]
#[command(version, about = "Keeps a to-do list in a JSON file.", long_about = None)]
struct Cmd {
    /// Task file to use instead of the configured one.
    #[arg(short, long, value_name = "FILE", global = true)]
    file: Option<PathBuf>,
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task. Without TEXT the editor is opened.
    Add {
        /// Task text, may start with `[due] (Priority) {Category}` tags.
        text: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long, value_name = "DATE")]
        due: Option<String>,
    },
    /// Remove the task with the number shown by `list`.
    Remove { number: usize },
    /// Change fields of a task. Without any flag the editor is opened.
    Update {
        number: usize,
        #[arg(short, long)]
        text: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long, value_name = "DATE")]
        due: Option<String>,
    },
    /// Print the tasks, optionally searched and filtered.
    List {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value = ALL)]
        category: String,
        #[arg(short, long, default_value = ALL)]
        priority: String,
    },
    /// Print the tasks whose text contains TERM, ignoring case.
    Search { term: String },
    /// Reorder the stored list by text, category, priority or due_date.
    Sort { key: SortKey },
    /// Replace the task list with the rows of a CSV file.
    Import { path: PathBuf },
    /// Write the task list as CSV, to stdout when no path is given.
    Export { path: Option<PathBuf> },
    /// Browse and edit the list interactively.
    Ui,
}

/// Converts a number printed by `list` into a list position.
fn position(number: usize) -> error::Result<usize> {
    number.checked_sub(1).ok_or(Error::NoSelection)
}

fn print_tasks<'a>(tasks: impl Iterator<Item = (usize, &'a task::Task)>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for (index, task) in tasks {
        writeln!(out, "{:>3}. {task}", index + 1)?;
    }
    Ok(())
}

fn add(
    store: &mut TaskStore,
    cfg: &Configuration,
    text: Option<String>,
    overrides: TaskPatch,
) -> Result<()> {
    let parsed = match text {
        Some(text) => parse_line(&text),
        None => parse_buffer(&compose(&cfg.tidy.editor, ENTRY_TEMPLATE)?),
    };
    let task = store.add(
        parsed.text.as_deref().unwrap_or_default(),
        overrides
            .category
            .or(parsed.category)
            .as_deref()
            .unwrap_or_default(),
        overrides
            .priority
            .or(parsed.priority)
            .unwrap_or(cfg.tidy.default_priority),
        overrides
            .due_date
            .or(parsed.due_date)
            .as_deref()
            .unwrap_or_default(),
    )?;
    println!("Added: {task}");
    Ok(())
}

fn update(store: &mut TaskStore, cfg: &Configuration, number: usize, patch: TaskPatch) -> Result<()> {
    let index = position(number)?;
    let patch = if patch == TaskPatch::default() {
        let initial = format!("{ENTRY_TEMPLATE}{}\n", render_entry(store.get(index)?));
        parse_edit(&compose(&cfg.tidy.editor, &initial)?)
    } else {
        patch
    };
    let task = store.update(index, &patch)?;
    println!("Updated: {task}");
    Ok(())
}

fn save(path: &Path, store: &TaskStore) -> Result<()> {
    storage::save(path, store).wrap_err_with(|| format!("Can't save tasks to {}", path.display()))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("TIDY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cmds = Cmd::parse();
    let cfg = Configuration::load().wrap_err("Can't load configuration")?;
    let data_file = cmds.file.unwrap_or_else(|| cfg.data_file());
    let mut store = storage::load(&data_file)
        .wrap_err_with(|| format!("Can't load tasks from {}", data_file.display()))?;

    match cmds.commands {
        Commands::Add {
            text,
            category,
            priority,
            due,
        } => {
            let overrides = TaskPatch {
                text: None,
                category,
                priority,
                due_date: due,
            };
            add(&mut store, &cfg, text, overrides)?;
            save(&data_file, &store)?;
        }
        Commands::Remove { number } => {
            let task = store.remove(position(number)?)?;
            println!("Removed: {task}");
            save(&data_file, &store)?;
        }
        Commands::Update {
            number,
            text,
            category,
            priority,
            due,
        } => {
            let patch = TaskPatch {
                text,
                category,
                priority,
                due_date: due,
            };
            update(&mut store, &cfg, number, patch)?;
            save(&data_file, &store)?;
        }
        Commands::List {
            search,
            category,
            priority,
        } => {
            let query = Query::from_choices(&search, &category, &priority)?;
            print_tasks(store.visible(&query))?;
            if query != Query::default() {
                println!("({} of {} task(s) shown)", store.filter(&query).count(), store.len());
            }
        }
        Commands::Search { term } => {
            let hits = store.search(&term);
            if hits.clone().next().is_none() {
                println!("No task matches \"{term}\".");
            }
            for task in hits {
                println!("{task}");
            }
        }
        Commands::Sort { key } => {
            store.sort(key);
            print_tasks(store.tasks().iter().enumerate())?;
            save(&data_file, &store)?;
        }
        Commands::Import { path } => {
            let count = storage::import_csv(&path, &mut store)
                .wrap_err_with(|| format!("Can't import {}", path.display()))?;
            println!("Imported {count} task(s).");
            save(&data_file, &store)?;
        }
        Commands::Export { path } => match path {
            Some(path) => {
                storage::export_csv(&path, &store)
                    .wrap_err_with(|| format!("Can't export to {}", path.display()))?;
                println!("Exported {} task(s).", store.len());
            }
            None => print!("{}", store.export_csv()),
        },
        Commands::Ui => list_ui::run(&mut store, &cfg, &data_file)?,
    }
    Ok(())
}
