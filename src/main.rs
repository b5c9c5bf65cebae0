use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Position, Rect};
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::{DefaultTerminal, Frame};
use segedit::config::Config;
use segedit::input::keybindings::{Action, KeybindingResolver};
use segedit::model::error::EditorError;
use segedit::model::gap_buffer::GapBuffer;
use segedit::model::search::{ReplaceDecision, SearchOutcome};
use segedit::model::segment::SegmentId;
use segedit::model::selection::Selection;
use segedit::services::storage::LocalStorage;
use segedit::services::tracing_setup;
use segedit::session::{EditorSession, SessionOptions};
use segedit::view::prompt::{Prompt, PromptType};
use segedit::view::surface::GridSurface;
use std::io::{self, Write};
use std::path::PathBuf;

/// A terminal screen editor built on a segmented gap-buffer engine
#[derive(Parser, Debug)]
#[command(name = "segedit")]
#[command(about = "A terminal screen editor built on a segmented gap-buffer engine", long_about = None)]
#[command(version)]
struct Args {
    /// Files to open, one per segment
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Path to a custom config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file for editor diagnostics
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

/// The terminal keeps its last row for the status line.
fn text_area(area: Rect) -> Rect {
    Rect::new(area.x, area.y, area.width, area.height.saturating_sub(1))
}

fn status_area(area: Rect) -> Rect {
    let row = area.y + area.height.saturating_sub(1);
    Rect::new(area.x, row, area.width, area.height.min(1))
}

fn surface_for(width: u16, height: u16) -> GridSurface {
    GridSurface::new(height.saturating_sub(1).max(1) as usize, width.max(1) as usize)
}

fn draw_surface(frame: &mut Frame, surface: &GridSurface) {
    frame.render_widget(surface, text_area(frame.area()));
}

fn place_text_cursor(frame: &mut Frame, surface: &GridSurface) {
    let (row, col) = surface.cursor();
    frame.set_cursor_position(Position::new(col as u16, row as u16));
}

fn ring_bell() {
    let mut stdout = io::stdout();
    // The bell is best-effort; a failed write only loses the beep.
    let _ = stdout.write_all(b"\x07").and_then(|_| stdout.flush());
}

struct App {
    session: EditorSession,
    keys: KeybindingResolver,
    prompt: Option<Prompt>,
    last_search: Option<String>,
    should_quit: bool,
}

impl App {
    fn new(config: &Config, surface: GridSurface) -> AnyhowResult<Self> {
        let session = EditorSession::new(
            SessionOptions::from(config),
            Box::new(LocalStorage::new()),
            surface,
        )
        .context("Failed to set up segments")?;
        Ok(Self {
            session,
            keys: KeybindingResolver::new(config),
            prompt: None,
            last_search: None,
            should_quit: false,
        })
    }

    /// Load each file into its own unused segment, then return to the first.
    fn open_files(&mut self, files: &[PathBuf]) -> AnyhowResult<()> {
        let mut first = None;
        for path in files {
            let name = path.to_string_lossy();
            let free = self
                .session
                .list_documents()
                .into_iter()
                .find(|entry| entry.name.is_empty() && entry.size == 0 && !entry.modified);
            let Some(entry) = free else {
                tracing::warn!("no free segment for {}", name);
                self.session.set_status(format!("No free segment for {name}"));
                break;
            };
            self.session.switch_to(entry.id)?;
            first.get_or_insert(entry.id);
            match self.session.open(&name) {
                Ok(_) => {}
                Err(EditorError::NotFound { .. }) => {
                    self.session.set_status(format!("New file: {name}"));
                }
                Err(e) => self.report_error(e),
            }
        }
        if let Some(id) = first {
            self.session.switch_to(id)?;
        }
        Ok(())
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> AnyhowResult<()> {
        while !self.should_quit {
            if self.session.take_alert() {
                ring_bell();
            }
            terminal.draw(|frame| self.draw(frame))?;

            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    self.handle_key(key, terminal)?;
                }
                Event::Resize(width, height) => {
                    tracing::debug!("resize to {}x{}", width, height);
                    self.session.resize(surface_for(width, height));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        let surface = self.session.surface();
        draw_surface(frame, surface);
        let status = status_area(frame.area());

        match &self.prompt {
            Some(prompt) => {
                let (text, col) = prompt.display();
                frame.render_widget(Line::from(text).reversed(), status);
                frame.set_cursor_position(Position::new(status.x + col as u16, status.y));
            }
            None => {
                frame.render_widget(Line::from(self.status_line()).reversed(), status);
                place_text_cursor(frame, surface);
            }
        }
    }

    fn status_line(&self) -> String {
        if let Some(message) = self.session.status() {
            return message.to_string();
        }
        let doc = self.session.document();
        let name = if doc.header.name.is_empty() {
            "[No Name]"
        } else {
            doc.header.name.as_str()
        };
        format!(
            " {}{} | segment {} part {} | {}/{} bytes, {} free",
            name,
            if doc.header.modified { " [+]" } else { "" },
            self.session.active(),
            doc.header.part,
            doc.buffer.caret().0,
            doc.buffer.len(),
            doc.buffer.free(),
        )
    }

    fn report_error(&mut self, error: EditorError) {
        tracing::warn!("{}", error);
        self.session.set_status(format!("Error: {error}"));
    }

    fn report<T>(&mut self, result: segedit::model::error::Result<T>) {
        if let Err(e) = result {
            self.report_error(e);
        }
    }

    fn start_prompt(&mut self, message: &str, prompt_type: PromptType, initial: Option<String>) {
        self.prompt = Some(match initial {
            Some(text) => Prompt::with_initial_text(message.to_string(), prompt_type, text),
            None => Prompt::new(message.to_string(), prompt_type),
        });
    }

    fn handle_key(&mut self, key: KeyEvent, terminal: &mut DefaultTerminal) -> AnyhowResult<()> {
        if self.prompt.is_some() {
            self.handle_prompt_key(key, terminal);
            return Ok(());
        }
        self.session.clear_status();

        let action = self.keys.resolve(&key);
        tracing::trace!("action {:?}", action);
        match action {
            Action::InsertChar(c) => {
                self.session.insert_char(c);
            }
            Action::InsertNewline => {
                self.session.insert_byte(b'\n');
            }
            Action::InsertTab => {
                self.session.insert_tab();
            }
            Action::MoveLeft => {
                self.session.move_left();
            }
            Action::MoveRight => {
                self.session.move_right();
            }
            Action::MoveUp => {
                self.session.move_up();
            }
            Action::MoveDown => {
                self.session.move_down();
            }
            Action::MoveLineStart => {
                self.session.row_start();
            }
            Action::MoveLineEnd => {
                self.session.row_end();
            }
            Action::MovePageUp => {
                self.session.page_up();
            }
            Action::MovePageDown => {
                self.session.page_down();
            }
            Action::MoveDocumentStart => {
                self.session.document_start();
            }
            Action::MoveDocumentEnd => {
                self.session.document_end();
            }
            Action::DeleteBackward => {
                self.session.delete_left();
            }
            Action::DeleteForward => {
                self.session.delete_right();
            }
            Action::ToggleSelection => self.session.toggle_selection(),
            Action::Copy => {
                let result = self.session.copy();
                self.report(result);
            }
            Action::Cut => {
                let result = self.session.cut();
                self.report(result);
            }
            Action::Paste => {
                let result = self.session.paste();
                self.report(result);
            }
            Action::Find => {
                self.start_prompt("Find: ", PromptType::Search, self.last_search.clone());
            }
            Action::FindNext => match self.last_search.clone() {
                Some(needle) => self.find(&needle),
                None => self.start_prompt("Find: ", PromptType::Search, None),
            },
            Action::Replace => {
                self.start_prompt("Replace: ", PromptType::ReplaceSearch, self.last_search.clone());
            }
            Action::QueryReplace => {
                self.start_prompt(
                    "Query replace: ",
                    PromptType::QueryReplaceSearch,
                    self.last_search.clone(),
                );
            }
            Action::Save => match self.session.save() {
                Err(EditorError::Unnamed) => {
                    self.start_prompt("Save as: ", PromptType::SaveFileAs, None);
                }
                result => self.report(result),
            },
            Action::SaveAs => {
                let name = self.session.document().header.name.clone();
                let initial = (!name.is_empty()).then_some(name);
                self.start_prompt("Save as: ", PromptType::SaveFileAs, initial);
            }
            Action::SaveSelection => {
                if self.session.selection().non_empty_range().is_some() {
                    self.start_prompt("Write selection to: ", PromptType::SaveSelection, None);
                } else {
                    self.session.set_status("Nothing is selected");
                }
            }
            Action::Open => self.start_prompt("Open: ", PromptType::OpenFile, None),
            Action::InsertFile => self.start_prompt("Insert file: ", PromptType::InsertFile, None),
            Action::Quit => {
                if self.session.has_unsaved_changes() {
                    self.start_prompt(
                        "Modified documents exist. Quit anyway? (y/n) ",
                        PromptType::ConfirmQuit,
                        None,
                    );
                } else {
                    self.should_quit = true;
                }
            }
            Action::NextDocument => {
                let result = self.session.cycle_document(true);
                self.report(result);
            }
            Action::PrevDocument => {
                let result = self.session.cycle_document(false);
                self.report(result);
            }
            Action::ListDocuments => self.list_documents(),
            Action::Cancel | Action::None => {}
        }
        Ok(())
    }

    /// Show the occupied segments and ask which one to switch to.
    fn list_documents(&mut self) {
        let active = self.session.active();
        let listing = self
            .session
            .list_documents()
            .into_iter()
            .filter(|entry| entry.size > 0 || !entry.name.is_empty() || entry.id == active)
            .map(|entry| {
                format!(
                    "{}{}:{}{}",
                    if entry.id == active { ">" } else { "" },
                    entry.id,
                    if entry.name.is_empty() { "-" } else { entry.name.as_str() },
                    if entry.modified { "*" } else { "" },
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.start_prompt(
            &format!("{listing}  Switch to: "),
            PromptType::SwitchDocument,
            None,
        );
    }

    fn switch_document(&mut self, text: &str) {
        match text.trim().parse::<usize>() {
            Ok(id) => {
                let result = self.session.switch_to(SegmentId(id));
                self.report(result);
            }
            Err(_) => self.session.set_status(format!("Not a segment number: {text}")),
        }
    }

    fn find(&mut self, needle: &str) {
        if needle.is_empty() {
            return;
        }
        self.last_search = Some(needle.to_string());
        self.session.find(needle.as_bytes());
    }

    fn handle_prompt_key(&mut self, key: KeyEvent, terminal: &mut DefaultTerminal) {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('g'), KeyModifiers::CONTROL) => {
                self.prompt = None;
                self.session.set_status("Cancelled");
                return;
            }
            (KeyCode::Enter, _) => {
                if let Some(prompt) = self.prompt.take() {
                    self.confirm_prompt(prompt, terminal);
                }
                return;
            }
            _ => {}
        }

        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match (key.code, key.modifiers) {
            (KeyCode::Backspace, _) => prompt.backspace(),
            (KeyCode::Delete, _) => prompt.delete(),
            (KeyCode::Left, _) => prompt.cursor_left(),
            (KeyCode::Right, _) => prompt.cursor_right(),
            (KeyCode::Home, _) | (KeyCode::Char('a'), KeyModifiers::CONTROL) => {
                prompt.move_to_start()
            }
            (KeyCode::End, _) | (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
                prompt.move_to_end()
            }
            (KeyCode::Char('k'), KeyModifiers::CONTROL) => prompt.delete_to_end(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => prompt.clear(),
            (KeyCode::Char(c), KeyModifiers::NONE) | (KeyCode::Char(c), KeyModifiers::SHIFT) => {
                prompt.insert_char(c)
            }
            _ => {}
        }
    }

    fn confirm_prompt(&mut self, prompt: Prompt, terminal: &mut DefaultTerminal) {
        let text = prompt.get_text();
        let yes = text.trim().eq_ignore_ascii_case("y");

        match prompt.prompt_type {
            PromptType::OpenFile => {
                let result = self.session.open(&text);
                self.report(result);
            }
            PromptType::InsertFile => {
                let result = self.session.insert_file(&text);
                self.report(result);
            }
            PromptType::SaveFileAs => match self.session.save_as(&text, false) {
                Err(EditorError::OverwriteConfirmationRequired { name }) => {
                    self.start_prompt(
                        &format!("{name} exists. Overwrite? (y/n) "),
                        PromptType::ConfirmOverwrite { name },
                        None,
                    );
                }
                result => self.report(result),
            },
            PromptType::ConfirmOverwrite { name } => {
                if yes {
                    let result = self.session.save_as(&name, false);
                    self.report(result);
                } else {
                    self.session.set_status("Not saved");
                }
            }
            PromptType::SaveSelection => {
                let result = self.session.save_selection(&text);
                self.report(result);
            }
            PromptType::Search => self.find(&text),
            PromptType::ReplaceSearch if !text.is_empty() => {
                self.start_prompt(
                    &format!("Replace {text} with: "),
                    PromptType::Replace { search: text },
                    None,
                );
            }
            PromptType::Replace { search } => {
                self.last_search = Some(search.clone());
                self.session.replace_all(search.as_bytes(), text.as_bytes());
            }
            PromptType::QueryReplaceSearch if !text.is_empty() => {
                self.start_prompt(
                    &format!("Query replace {text} with: "),
                    PromptType::QueryReplace { search: text },
                    None,
                );
            }
            PromptType::QueryReplace { search } => {
                self.last_search = Some(search.clone());
                self.query_replace(&search, &text, terminal);
            }
            PromptType::SwitchDocument if !text.trim().is_empty() => self.switch_document(&text),
            PromptType::ConfirmQuit => self.should_quit = yes,
            PromptType::ReplaceSearch
            | PromptType::QueryReplaceSearch
            | PromptType::SwitchDocument => {}
        }
    }

    /// Ask y/n/q on the status line for every match.
    fn query_replace(&mut self, search: &str, replacement: &str, terminal: &mut DefaultTerminal) {
        let question = format!("Replace {search} with {replacement}? (y/n/q)");
        let mut decide = |_: &GapBuffer, _: &Selection, surface: &GridSurface| loop {
            let drawn = terminal.draw(|frame| {
                draw_surface(frame, surface);
                let status = status_area(frame.area());
                frame.render_widget(Line::from(question.as_str()).reversed(), status);
                place_text_cursor(frame, surface);
            });
            if let Err(e) = drawn {
                tracing::warn!("query replace draw failed: {}", e);
                return ReplaceDecision::Abort;
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('y') | KeyCode::Char(' ') => return ReplaceDecision::Replace,
                    KeyCode::Char('n') | KeyCode::Backspace => return ReplaceDecision::Skip,
                    KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => {
                        return ReplaceDecision::Abort
                    }
                    _ => ring_bell(),
                },
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("query replace input failed: {}", e);
                    return ReplaceDecision::Abort;
                }
            }
        };
        let outcome = self
            .session
            .query_replace(search.as_bytes(), replacement.as_bytes(), &mut decide);
        if let SearchOutcome::Finished(summary) = outcome {
            if summary.aborted {
                self.session.set_status(format!(
                    "Stopped after replacing {} of {} matches",
                    summary.replaced, summary.matches
                ));
            }
        }
    }
}

fn load_config(args: &Args) -> AnyhowResult<Config> {
    match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::load_or_default()),
    }
}

fn run_editor(terminal: &mut DefaultTerminal, config: &Config, files: &[PathBuf]) -> AnyhowResult<()> {
    let size = terminal.size().context("Failed to query terminal size")?;
    let mut app = App::new(config, surface_for(size.width, size.height))?;
    app.open_files(files)?;
    app.run(terminal)
}

fn real_main() -> AnyhowResult<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.dump_config {
        println!("{}", config.to_json().context("Failed to serialize config")?);
        return Ok(());
    }

    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("segedit.log"));
    tracing_setup::init_file_logging(&log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
    tracing::info!("segedit starting with {} file(s)", args.files.len());

    let mut terminal = ratatui::init();
    let result = run_editor(&mut terminal, &config, &args.files);
    ratatui::restore();

    if let Err(e) = &result {
        tracing::error!("segedit exited with error: {:#}", e);
    }
    result
}

fn main() -> AnyhowResult<()> {
    real_main()
}
