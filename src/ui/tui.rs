// ============================================================
// Layer 1 — Terminal Front-End (ratatui)
// ============================================================
// The same workflow as the web page, in a full-screen terminal UI:
//
//   ┌ Examples ──┐┌ Subreddit name - r/ ──────────────┐
//   │> Cats      ││ cats                              │
//   │  Paper     │├ Title ────────────────────────────┤
//   │            ││ Why do cats sleep                 │
//   │            │├ Post ─────────────────────────────┤
//   │            ││ ...                               │
//   │            │├ Summary ──────────────────────────┤
//   │            ││ ...                               │
//   └────────────┘└───────────────────────────────────┘
//    Tab focus · ↑↓ Enter choose · Ctrl-S summarize · Esc quit
//
// Editing is append-only (type / Backspace / Enter in Post), which
// is all the demo needs. Summarizing blocks the UI; the status line
// says so before the call starts.
//
// Logs go to a file while the terminal is in raw mode (see main.rs).
//
// Reference: ratatui documentation
//            crossterm documentation (raw mode, alternate screen)

use anyhow::Result;
use ratatui::{
    crossterm::{
        event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    },
    prelude::*,
    widgets::{Block, List, ListItem, ListState, Paragraph, Wrap},
};
use std::{
    io::{self, Stdout},
    panic::{set_hook, take_hook},
    time::Duration,
};

use crate::application::session::Session;
use crate::domain::traits::{ExampleSource, PostSummarizer};

const ACCENT:     Color = Color::Rgb(0xB6, 0x36, 0x4A);
const SUMMARY_BG: Color = Color::Rgb(0x90, 0xEE, 0x90);
const POLL_MILLIS: u64  = 100;

// ─── State ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Gallery,
    Topic,
    Title,
    Content,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Gallery => Focus::Topic,
            Focus::Topic   => Focus::Title,
            Focus::Title   => Focus::Content,
            Focus::Content => Focus::Gallery,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Gallery => Focus::Content,
            Focus::Topic   => Focus::Gallery,
            Focus::Title   => Focus::Topic,
            Focus::Content => Focus::Title,
        }
    }
}

/// What the event loop should do after a key press.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Continue,
    Summarize,
    Quit,
}

struct App<'a, S> {
    session:     Session<'a, S>,
    focus:       Focus,
    highlighted: usize,
    status:      String,
}

impl<'a, S: ExampleSource + PostSummarizer> App<'a, S> {
    fn new(source: &'a S) -> Result<Self> {
        Ok(Self {
            session:     Session::new(source)?,
            focus:       Focus::Gallery,
            highlighted: 0,
            status:      "Ready".to_string(),
        })
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc                    => return Action::Quit,
            KeyCode::Char('c') if ctrl      => return Action::Quit,
            KeyCode::Char('s') if ctrl      => return Action::Summarize,
            KeyCode::F(5)                   => return Action::Summarize,
            KeyCode::Tab                    => self.focus = self.focus.next(),
            KeyCode::BackTab                => self.focus = self.focus.prev(),
            _ if self.focus == Focus::Gallery => self.gallery_key(key.code),
            _                               => self.edit_key(key.code),
        }
        Action::Continue
    }

    fn gallery_key(&mut self, code: KeyCode) {
        let count = self.session.examples().len();
        match code {
            KeyCode::Up   => self.highlighted = self.highlighted.saturating_sub(1),
            KeyCode::Down => self.highlighted = (self.highlighted + 1).min(count.saturating_sub(1)),
            KeyCode::Enter => match self.session.choose(self.highlighted) {
                Ok(()) => {
                    self.status = format!("Loaded example {}", self.highlighted);
                    self.focus  = Focus::Content;
                }
                Err(e) => self.status = format!("Error: {e:#}"),
            },
            _ => {}
        }
    }

    fn edit_key(&mut self, code: KeyCode) {
        let field = match self.focus {
            Focus::Topic   => &mut self.session.topic,
            Focus::Title   => &mut self.session.title,
            Focus::Content => &mut self.session.content,
            Focus::Gallery => return,
        };
        match code {
            KeyCode::Char(c)   => field.push(c),
            KeyCode::Backspace => {
                field.pop();
            }
            // Single-line fields ignore Enter
            KeyCode::Enter if self.focus == Focus::Content => field.push('\n'),
            _ => {}
        }
    }

    fn summarize(&mut self) {
        match self.session.summarize() {
            Ok(_)  => self.status = "Summary ready".to_string(),
            Err(e) => {
                tracing::error!("Summary failed: {e:#}");
                self.status = format!("Error: {e:#}");
            }
        }
    }

    // ─── Rendering ────────────────────────────────────────────────────────────
    fn block(&self, title: &'static str, focus: Focus) -> Block<'static> {
        let style = if self.focus == focus {
            Style::new().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::new()
        };
        Block::bordered().title(title).border_style(style)
    }

    fn draw(&self, frame: &mut Frame) {
        let [body, footer] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(2)]).areas(frame.area());
        let [gallery, form] =
            Layout::horizontal([Constraint::Length(28), Constraint::Min(0)]).areas(body);
        let [topic, title, content, summary] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(8),
        ])
        .areas(form);

        let items: Vec<ListItem> = self
            .session
            .examples()
            .iter()
            .enumerate()
            .map(|(i, ex)| {
                let marker = if i == self.session.selected() { "● " } else { "  " };
                ListItem::new(format!("{marker}{}", ex.title))
            })
            .collect();
        let mut state = ListState::default().with_selected(Some(self.highlighted));
        frame.render_stateful_widget(
            List::new(items)
                .block(self.block("Examples", Focus::Gallery))
                .highlight_style(Style::new().fg(ACCENT).add_modifier(Modifier::REVERSED))
                .highlight_symbol("> "),
            gallery,
            &mut state,
        );

        frame.render_widget(
            Paragraph::new(self.session.topic.as_str()).block(self.block("Subreddit name - r/", Focus::Topic)),
            topic,
        );
        frame.render_widget(
            Paragraph::new(self.session.title.as_str()).block(self.block("Title", Focus::Title)),
            title,
        );
        frame.render_widget(
            Paragraph::new(self.session.content.as_str())
                .wrap(Wrap { trim: false })
                .block(self.block("Post", Focus::Content)),
            content,
        );
        frame.render_widget(
            Paragraph::new(self.session.summary().unwrap_or(""))
                .wrap(Wrap { trim: true })
                .style(Style::new().fg(Color::Black).bg(SUMMARY_BG))
                .block(Block::bordered().title("Summary")),
            summary,
        );

        let help = Line::from(vec![
            Span::styled(format!(" {} ", self.status), Style::new().fg(ACCENT).add_modifier(Modifier::BOLD)),
            Span::raw("· Tab focus · ↑↓ Enter choose · Ctrl-S summarize · Esc quit"),
        ]);
        frame.render_widget(Paragraph::new(help), footer);
    }
}

// ─── Terminal lifecycle ───────────────────────────────────────────────────────
type TerminalBackend = CrosstermBackend<Stdout>;

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Puts the terminal back when dropped, including on early return.
struct TerminalGuard {
    terminal: Terminal<TerminalBackend>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        enable_raw_mode()?;

        // Leave raw mode before the panic message is printed, or it is unreadable
        let previous = take_hook();
        set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));

        Ok(Self { terminal: Terminal::new(CrosstermBackend::new(stdout))? })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
        let _ = self.terminal.show_cursor();
    }
}

/// Run the terminal front-end until the user quits.
pub fn run<S: ExampleSource + PostSummarizer>(source: &S) -> Result<()> {
    let mut app   = App::new(source)?;
    let mut guard = TerminalGuard::enter()?;
    tracing::info!("Terminal front-end started");

    loop {
        guard.terminal.draw(|frame| app.draw(frame))?;

        if !event::poll(Duration::from_millis(POLL_MILLIS))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key) {
            Action::Continue  => {}
            Action::Quit      => break,
            Action::Summarize => {
                app.status = "Summarizing…".to_string();
                guard.terminal.draw(|frame| app.draw(frame))?;
                app.summarize();
            }
        }
    }

    tracing::info!("Terminal front-end stopped");
    Ok(())
}
