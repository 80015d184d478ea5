//! TUI entry point and terminal setup.

use std::io;
use std::panic;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};

use crate::config::UiSettings;
use crate::store::Store;
use crate::tui::app::App;

/// Initialise and run the terminal user interface until the user quits.
pub fn run_tui(store: Store, settings: UiSettings) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    chain_panic_hook(|| {
        let _ = restore_terminal();
    });
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, settings);
    let result = app.run(&mut terminal);

    restore_terminal()?;
    terminal.show_cursor()?;

    result
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

/// Run `before` on panic, then hand over to whatever hook was installed.
fn chain_panic_hook<F>(before: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        before();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn panic_runs_cleanup_before_previous_hook() {
        let restored = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&restored);
        chain_panic_hook(move || flag.store(true, Ordering::SeqCst));

        let outcome = panic::catch_unwind(|| panic!("draw failed"));
        // Back to the default hook.
        let _ = panic::take_hook();

        assert!(outcome.is_err());
        assert!(restored.load(Ordering::SeqCst));
    }
}
