//! The protocol serving loop.
//!
//! Reads command lines, parses them, and drives the `Searcher`. A
//! `go` command runs the search on a background thread; `stop` and
//! `quit` only touch the shared stop flag, every other
//! state-mutating command joins the search thread first.

use std::io;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;
use crate::evaluator;
use crate::searcher::{OutputSink, Searcher, SharedSink};
use crate::uci::{parse_uci_command, UciCommand};
use crate::utils::perft;

pub const ENGINE_NAME: &str = concat!("lysander ", env!("CARGO_PKG_VERSION"));
pub const ENGINE_AUTHOR: &str = "the lysander authors";

/// Writes every line to standard output.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn send_line(&mut self, line: String) {
        println!("{}", line);
    }
}

/// Forwards every line into a channel. Used by tests to capture the
/// engine's output.
pub struct ChannelSink(pub Sender<String>);

impl OutputSink for ChannelSink {
    fn send_line(&mut self, line: String) {
        self.0.send(line).ok();
    }
}

/// The engine front-end: a searcher plus the thread bookkeeping
/// around it.
pub struct Engine {
    sink: SharedSink,
    searcher: Option<Searcher>,
    search_thread: Option<JoinHandle<Searcher>>,
    stop_flag: Arc<AtomicBool>,
}

impl Engine {
    /// Creates a new instance emitting through the given sink.
    pub fn new(sink: SharedSink) -> Engine {
        let searcher = Searcher::new(sink.clone());
        let stop_flag = searcher.stop_flag();
        Engine {
            sink,
            searcher: Some(searcher),
            search_thread: None,
            stop_flag,
        }
    }

    /// Serves commands from `input` until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            if let Ok(command) = parse_uci_command(&line) {
                if self.dispatch(command) {
                    break;
                }
            }
        }
        self.join_search();
    }

    fn emit(&self, line: String) {
        self.sink.lock().unwrap().send_line(line);
    }

    fn join_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            self.searcher = Some(handle.join().unwrap());
        }
    }

    /// Takes the searcher out of the engine, joining a running search
    /// thread first.
    fn take_searcher(&mut self) -> Searcher {
        self.join_search();
        self.searcher.take().unwrap()
    }

    /// Handles one command. Returns `true` on `quit`.
    fn dispatch(&mut self, command: UciCommand) -> bool {
        match command {
            UciCommand::Uci => {
                self.emit(format!("id name {}", ENGINE_NAME));
                self.emit(format!("id author {}", ENGINE_AUTHOR));
                self.emit("option name Hash type spin default 16 min 1 max 1048576".to_string());
                self.emit("uciok".to_string());
            }
            UciCommand::IsReady => {
                self.emit("readyok".to_string());
            }
            UciCommand::SetOption(params) => {
                if params.name == "Hash" {
                    if let Ok(size_mb) = params.value.parse() {
                        let mut searcher = self.take_searcher();
                        searcher.resize_table(size_mb);
                        self.searcher = Some(searcher);
                    }
                }
            }
            UciCommand::UciNewGame => {
                let mut searcher = self.take_searcher();
                searcher.new_game();
                self.searcher = Some(searcher);
            }
            UciCommand::Position(params) => {
                let mut searcher = self.take_searcher();
                searcher.setup(&params);
                self.searcher = Some(searcher);
            }
            UciCommand::Go(params) => {
                let mut searcher = self.take_searcher();
                // Clear a stale stop request before the search thread
                // starts, not on it, so a `stop` arriving right after
                // this command can not be lost.
                self.stop_flag.store(false, Ordering::Relaxed);
                self.search_thread = Some(thread::spawn(move || {
                    searcher.go(&params);
                    searcher
                }));
            }
            UciCommand::Stop => {
                self.stop_flag.store(true, Ordering::Relaxed);
            }
            UciCommand::Quit => {
                // Like `stop`-less GUIs expect: the running search is
                // allowed to finish before the process exits.
                return true;
            }
            UciCommand::Perft(depth) => {
                let mut searcher = self.take_searcher();
                let nodes = perft(searcher.board_mut(), depth);
                self.emit(format!("Nodes searched: {}", nodes));
                self.searcher = Some(searcher);
            }
            UciCommand::ShowBoard => {
                let searcher = self.take_searcher();
                self.emit(format!("{}", searcher.board()));
                self.searcher = Some(searcher);
            }
            UciCommand::Eval => {
                let searcher = self.take_searcher();
                self.emit(format!("{}", evaluator::evaluate(searcher.board())));
                self.searcher = Some(searcher);
            }
        }
        false
    }
}

/// Runs the engine on standard input/output until `quit`.
pub fn run() {
    let sink: SharedSink = Arc::new(Mutex::new(StdoutSink));
    let mut engine = Engine::new(sink.clone());
    sink.lock().unwrap().send_line(format!("{} by {}", ENGINE_NAME, ENGINE_AUTHOR));
    let stdin = io::stdin();
    let locked = stdin.lock();
    engine.run(locked);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc::{channel, Receiver};

    fn run_session(commands: &str) -> Vec<String> {
        let (tx, rx): (Sender<String>, Receiver<String>) = channel();
        let sink: SharedSink = Arc::new(Mutex::new(ChannelSink(tx)));
        let mut engine = Engine::new(sink);
        engine.run(Cursor::new(commands.to_string()));
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn handshake() {
        let lines = run_session("uci\nisready\nquit\n");
        assert_eq!(lines[0], format!("id name {}", ENGINE_NAME));
        assert_eq!(lines[1], format!("id author {}", ENGINE_AUTHOR));
        assert!(lines[2].starts_with("option name Hash"));
        assert_eq!(lines[3].as_str(), "uciok");
        assert_eq!(lines[4].as_str(), "readyok");
    }

    #[test]
    fn garbage_is_ignored() {
        let lines = run_session("xyzzy\nsetoption name Hash value garbage\nisready\nquit\n");
        assert_eq!(lines, vec!["readyok".to_string()]);
    }

    #[test]
    fn go_and_quit() {
        let lines = run_session("position startpos\ngo depth 2\nquit\n");
        assert!(lines.iter().any(|l| l.starts_with("bestmove ")));
    }

    #[test]
    fn perft_command() {
        let lines = run_session("position startpos\nperft 3\nquit\n");
        assert_eq!(lines, vec!["Nodes searched: 8902".to_string()]);
    }

    #[test]
    fn show_board_command() {
        let lines = run_session("position startpos moves e2e4\nboard\nquit\n");
        assert!(lines[0].contains("turn: black"));
        assert!(lines[0].contains("ep: e"));
    }
}
