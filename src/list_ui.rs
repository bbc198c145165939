use std::path::Path;

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{Block, List, ListItem, ListState, Paragraph};
use ratatui::{DefaultTerminal, Frame};

use crate::config::Configuration;
use crate::content_parser::{parse_buffer, parse_edit, render_entry};
use crate::editor::{ENTRY_TEMPLATE, compose};
use crate::error::{self, Error, ErrorKind};
use crate::storage;
use crate::store::{ALL, Query, SortKey, TaskStore};
use crate::task::Priority;

const HELP: &str =
    "a add  e edit  d delete  u undo  r redo  s sort  c category  p priority  / search  w save  q quit";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    Search,
}

/// Work that has to happen outside the alternate screen.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Compose {
    Add,
    Edit(usize),
}

pub struct TaskWidget<'a> {
    store: &'a mut TaskStore,
    config: &'a Configuration,
    data_file: &'a Path,
    list_state: ListState,
    query: Query,
    sort_key: Option<SortKey>,
    mode: Mode,
    status: Option<String>,
    exit: bool,
}

pub fn run(store: &mut TaskStore, config: &Configuration, data_file: &Path) -> Result<()> {
    let mut terminal = ratatui::try_init()?;
    let mut widget = TaskWidget::new(store, config, data_file);
    let res = widget.event_loop(&mut terminal);
    ratatui::try_restore()?;
    res
}

impl<'a> TaskWidget<'a> {
    fn new(store: &'a mut TaskStore, config: &'a Configuration, data_file: &'a Path) -> Self {
        let mut list_state = ListState::default();
        if !store.is_empty() {
            list_state.select(Some(0));
        }
        TaskWidget {
            store,
            config,
            data_file,
            list_state,
            query: Query::default(),
            sort_key: None,
            mode: Mode::Normal,
            status: None,
            exit: false,
        }
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while !self.exit {
            terminal.draw(|frame| self.render(frame))?;
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(target) = self.handle_key(key) {
                ratatui::try_restore()?;
                self.compose(target);
                *terminal = ratatui::try_init()?;
            }
        }
        Ok(())
    }

    /// Positions in the full list of the rows currently shown.
    fn rows(&self) -> Vec<usize> {
        self.store.visible(&self.query).map(|(i, _)| i).collect()
    }

    fn selected(&self) -> error::Result<usize> {
        self.list_state
            .selected()
            .and_then(|row| self.rows().get(row).copied())
            .ok_or(Error::NoSelection)
    }

    fn clamp_selection(&mut self) {
        let len = self.rows().len();
        let selected = match (self.list_state.selected(), len) {
            (_, 0) => None,
            (Some(row), _) => Some(row.min(len - 1)),
            (None, _) => Some(0),
        };
        self.list_state.select(selected);
    }

    fn report<T>(&mut self, res: error::Result<T>, message: impl FnOnce(T) -> String) {
        self.status = Some(match res {
            Ok(value) => message(value),
            Err(e) => match e.kind() {
                ErrorKind::Validation | ErrorKind::Index => format!("Warning: {e}"),
                ErrorKind::Format | ErrorKind::Io => format!("Error: {e}"),
            },
        });
        self.clamp_selection();
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Compose> {
        match self.mode {
            Mode::Search => self.handle_search_key(key),
            Mode::Normal => return self.handle_normal_key(key),
        }
        None
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.query.term.push(c),
            KeyCode::Backspace => {
                self.query.term.pop();
            }
            KeyCode::Esc => {
                self.query.term.clear();
                self.mode = Mode::Normal;
            }
            KeyCode::Enter => self.mode = Mode::Normal,
            _ => {}
        }
        self.clamp_selection();
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<Compose> {
        match key.code {
            KeyCode::Char('q') => {
                let res = storage::save(self.data_file, self.store);
                self.exit = res.is_ok();
                self.report(res, |_| "Saved.".to_string());
            }
            KeyCode::Char('w') => {
                let path = self.data_file;
                let res = storage::save(path, self.store);
                self.report(res, |_| format!("Saved to {}.", path.display()));
            }
            KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
            KeyCode::Char('a') => return Some(Compose::Add),
            KeyCode::Char('e') => match self.selected() {
                Ok(index) => return Some(Compose::Edit(index)),
                Err(e) => self.report(Err::<(), _>(e), |_| String::new()),
            },
            KeyCode::Char('d') => {
                let res = self.selected().and_then(|index| self.store.remove(index));
                self.report(res, |task| format!("Removed \"{}\".", task.text));
            }
            KeyCode::Char('u') => {
                let undone = self.store.undo();
                self.report(Ok(undone), |undone| {
                    (if undone { "Undone." } else { "Nothing to undo." }).to_string()
                });
            }
            KeyCode::Char('r') => {
                let redone = self.store.redo();
                self.report(Ok(redone), |redone| {
                    (if redone { "Redone." } else { "Nothing to redo." }).to_string()
                });
            }
            KeyCode::Char('s') => {
                let key = match self.sort_key {
                    Some(current) => {
                        let pos = SortKey::ALL.iter().position(|k| *k == current).unwrap_or(0);
                        SortKey::ALL[(pos + 1) % SortKey::ALL.len()]
                    }
                    None => SortKey::ALL[0],
                };
                self.store.sort(key);
                self.sort_key = Some(key);
                self.report(Ok(key), |key| format!("Sorted by {key}."));
            }
            KeyCode::Char('c') => {
                self.cycle_category();
                self.clamp_selection();
            }
            KeyCode::Char('p') => {
                self.query.priority = match self.query.priority {
                    None => Some(Priority::Low),
                    Some(Priority::Low) => Some(Priority::Medium),
                    Some(Priority::Medium) => Some(Priority::High),
                    Some(Priority::High) => None,
                };
                self.clamp_selection();
            }
            KeyCode::Char('/') => self.mode = Mode::Search,
            _ => {}
        }
        None
    }

    fn cycle_category(&mut self) {
        let categories = self.store.categories();
        let next = match &self.query.category {
            None => categories.first(),
            Some(current) => categories
                .iter()
                .position(|c| *c == current.as_str())
                .and_then(|i| categories.get(i + 1)),
        };
        self.query.category = next.map(|c| c.to_string());
    }

    fn compose(&mut self, target: Compose) {
        match target {
            Compose::Add => {
                let res = self.compose_add();
                self.report(res, |text| format!("Added \"{text}\"."));
            }
            Compose::Edit(index) => {
                let res = self.compose_edit(index);
                self.report(res, |text| format!("Updated \"{text}\"."));
            }
        }
    }

    fn compose_add(&mut self) -> error::Result<String> {
        let buffer = compose(&self.config.tidy.editor, ENTRY_TEMPLATE)?;
        let patch = parse_buffer(&buffer);
        let task = self.store.add(
            patch.text.as_deref().unwrap_or_default(),
            patch.category.as_deref().unwrap_or_default(),
            patch.priority.unwrap_or(self.config.tidy.default_priority),
            patch.due_date.as_deref().unwrap_or_default(),
        )?;
        Ok(task.text)
    }

    fn compose_edit(&mut self, index: usize) -> error::Result<String> {
        let initial = format!("{ENTRY_TEMPLATE}{}\n", render_entry(self.store.get(index)?));
        let buffer = compose(&self.config.tidy.editor, &initial)?;
        let task = self.store.update(index, &parse_edit(&buffer))?;
        Ok(task.text)
    }

    fn filter_line(&self) -> Line<'static> {
        let category = self.query.category.as_deref().unwrap_or(ALL);
        let priority = self.query.priority.map_or(ALL, |p| p.as_str());
        let sort = self.sort_key.map_or("none", |k| k.as_str());
        let cursor = if self.mode == Mode::Search { "_" } else { "" };
        let undo = if self.store.can_undo() { "u" } else { "-" };
        let redo = if self.store.can_redo() { "r" } else { "-" };
        Line::from(format!(
            " search: {}{cursor}  category: {category}  priority: {priority}  sort: {sort}  history: {undo}{redo}",
            self.query.term
        ))
    }

    fn render(&mut self, frame: &mut Frame) {
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(Paragraph::new(self.filter_line()), header);

        let items: Vec<ListItem> = self
            .store
            .visible(&self.query)
            .map(|(i, task)| ListItem::new(format!("{:>3}. {task}", i + 1)))
            .collect();
        let title = format!(" Tasks ({}/{}) ", items.len(), self.store.len());
        let list = List::new(items)
            .block(Block::bordered().title(title))
            .highlight_style(Style::new().reversed())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, body, &mut self.list_state);

        let status = self.status.as_deref().unwrap_or(HELP);
        frame.render_widget(Paragraph::new(format!(" {status}")), footer);
    }
}
