//! Parses "Universal Chess Interface" protocol commands.

use regex::Regex;
use crate::board::STARTPOS_FEN;

/// A command from the GUI to the engine.
pub enum UciCommand {
    Uci,
    IsReady,
    SetOption(SetOptionParams),
    UciNewGame,
    Position(PositionParams),
    Go(GoParams),
    Stop,
    Quit,
    /// Development helper -- counts leaf nodes at a given depth.
    Perft(u32),
    /// Development helper -- dumps the current board.
    ShowBoard,
    /// Development helper -- prints the static evaluation.
    Eval,
}

/// Parameters for `UciCommand::SetOption`.
pub struct SetOptionParams {
    pub name: String,
    pub value: String,
}

/// Parameters for `UciCommand::Position`.
pub struct PositionParams {
    pub fen: String,
    pub moves: Vec<String>,
}

/// Parameters for `UciCommand::Go`.
#[derive(Clone, Default)]
pub struct GoParams {
    pub depth: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
}

pub struct ParseError;

/// Tries to interpret a string as a UCI command.
///
/// Unknown and malformed commands yield `Err`; the caller is expected
/// to silently drop them.
pub fn parse_uci_command(s: &str) -> Result<UciCommand, ParseError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            format!(r"\b({})\s*(?:\s(.*)|$)",
                    "setoption|isready|ucinewgame|\
                     position|go|stop|quit|uci|perft|board|eval",  // UCI command
            ).as_str()
        ).unwrap();
    }
    if let Some(captures) = RE.captures(s) {
        let command_str = captures.get(1).map_or("", |m| m.as_str());
        let params_str = captures.get(2).map_or("", |m| m.as_str());
        match command_str {
            "uci" => Ok(UciCommand::Uci),
            "stop" => Ok(UciCommand::Stop),
            "quit" => Ok(UciCommand::Quit),
            "isready" => Ok(UciCommand::IsReady),
            "ucinewgame" => Ok(UciCommand::UciNewGame),
            "setoption" => Ok(UciCommand::SetOption(parse_setoption_params(params_str)?)),
            "position" => Ok(UciCommand::Position(parse_position_params(params_str)?)),
            "go" => Ok(UciCommand::Go(parse_go_params(params_str))),
            "perft" => {
                match params_str.trim().parse() {
                    Ok(depth) => Ok(UciCommand::Perft(depth)),
                    Err(_) => Err(ParseError),
                }
            }
            "board" => Ok(UciCommand::ShowBoard),
            "eval" => Ok(UciCommand::Eval),
            _ => Err(ParseError),
        }
    } else {
        Err(ParseError)
    }
}

// A helper function for `parse_uci_command`. It parses parameters for
// the "setoption" command.
fn parse_setoption_params(s: &str) -> Result<SetOptionParams, ParseError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            r"^name\s+(.*?)(?:\s+value\s+(.*?))?\s*$").unwrap();
    }
    if let Some(captures) = RE.captures(s) {
        Ok(SetOptionParams {
            name: captures.get(1).map_or("", |m| m.as_str()).to_string(),
            value: captures.get(2).map_or("", |m| m.as_str()).to_string(),
        })
    } else {
        Err(ParseError)
    }
}

// A helper function for `parse_uci_command`. It parses parameters for
// the "position" command.
fn parse_position_params(s: &str) -> Result<PositionParams, ParseError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            format!(
                r"^(?:fen\s+(?P<fen>{})|startpos)(?:\s+moves(?P<moves>{}))?\s*$",
                r"[1-8KQRBNPkqrbnp/]+\s+[wb]\s+(?:[KQkq]{1,4}|-)\s+(?:[a-h][1-8]|-)\s+\d+\s+\d+",
                r"(?:\s+[a-h][1-8][a-h][1-8][qrbn]?)*",  // a possibly empty list of moves
            ).as_str()
        ).unwrap();
    }
    if let Some(captures) = RE.captures(s) {
        Ok(PositionParams {
            fen: if let Some(fen) = captures.name("fen") {
                fen.as_str().to_string()
            } else {
                STARTPOS_FEN.to_string()
            },
            moves: captures.name("moves")
                .map_or("", |m| m.as_str())
                .split_whitespace()
                .map(|x| x.to_string())
                .collect(),
        })
    } else {
        Err(ParseError)
    }
}

// A helper function for `parse_uci_command`. It parses parameters for
// the "go" command.
fn parse_go_params(s: &str) -> GoParams {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            format!(
                r"\b(?P<keyword>{})(?:\s+(?P<number>\d+))?(?:\s+|$)",
                "wtime|btime|winc|binc|depth",  // any keyword
            ).as_str()
        ).unwrap();
    }
    let mut params = GoParams::default();
    for captures in RE.captures_iter(s) {
        let keyword = captures.name("keyword").unwrap().as_str();
        if let Some(number) = captures.name("number") {
            let field = match keyword {
                "wtime" => &mut params.wtime,
                "btime" => &mut params.btime,
                "winc" => &mut params.winc,
                "binc" => &mut params.binc,
                "depth" => &mut params.depth,
                _ => panic!("invalid keyword"),
            };
            *field = number.as_str().parse::<u64>().ok();
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_params() {
        assert_eq!(parse_go_params(" wtime22000  ").wtime, None);
        assert_eq!(parse_go_params(" wtime    22000  ").wtime, Some(22000));
        assert_eq!(parse_go_params("wtime 22000").wtime, Some(22000));
        assert_eq!(parse_go_params("wtime 99999999999999998888888888999999999999999999").wtime,
                   None);
        assert_eq!(parse_go_params("depth 8").depth, Some(8));
        assert_eq!(parse_go_params("wtime 22000 btime 11000 winc 3 binc 4").binc, Some(4));
        assert_eq!(parse_go_params("btime 11000 winc 3").winc, Some(3));
        assert_eq!(parse_go_params("").depth, None);
    }

    #[test]
    fn setoption_params() {
        assert_eq!(parse_setoption_params("name   xxx  value   yyy  ").ok().unwrap().name,
                   "xxx".to_string());
        assert_eq!(parse_setoption_params("name xxx value yyy").ok().unwrap().value,
                   "yyy".to_string());
        assert_eq!(parse_setoption_params("name xxx   value  ").ok().unwrap().value,
                   "".to_string());
        assert_eq!(parse_setoption_params("name xxx    ").ok().unwrap().value,
                   "".to_string());
        assert!(parse_setoption_params("namexxx     ").is_err());
    }

    #[test]
    fn position_params() {
        assert_eq!(parse_position_params("startpos  ").ok().unwrap().fen, STARTPOS_FEN);
        assert_eq!(parse_position_params("startpos ").ok().unwrap().moves.len(), 0);
        assert_eq!(parse_position_params("startpos   moves  ").ok().unwrap().moves.len(), 0);
        assert_eq!(parse_position_params("startpos   moves   e2e4   d2d4 ")
                       .ok()
                       .unwrap()
                       .moves
                       .len(),
                   2);
        assert_eq!(parse_position_params("fen 8/8/8/8/8/8/8/k6K w - - 0 1 moves h1h2")
                       .ok()
                       .unwrap()
                       .moves
                       .len(),
                   1);
        assert_eq!(parse_position_params("fen   8/8/8/8/8/8/8/k6K w - - 0 1  moves e2e4")
                       .ok()
                       .unwrap()
                       .fen,
                   "8/8/8/8/8/8/8/k6K w - - 0 1".to_string());
        assert!(parse_position_params("fen 8/8/8 w").is_err());
    }

    #[test]
    fn uci_commands() {
        assert!(matches!(parse_uci_command("isready"), Ok(UciCommand::IsReady)));
        assert!(matches!(parse_uci_command("   isready  "), Ok(UciCommand::IsReady)));
        assert!(matches!(parse_uci_command("uci"), Ok(UciCommand::Uci)));
        assert!(matches!(parse_uci_command("ucinewgame"), Ok(UciCommand::UciNewGame)));
        assert!(matches!(parse_uci_command("stop"), Ok(UciCommand::Stop)));
        assert!(matches!(parse_uci_command(" foo quit  "), Ok(UciCommand::Quit)));
        assert!(matches!(parse_uci_command("position startpos"), Ok(UciCommand::Position(_))));
        assert!(matches!(parse_uci_command("position startpos moves e2e4 e7e5"),
                         Ok(UciCommand::Position(_))));
        assert!(matches!(parse_uci_command("go depth 6"), Ok(UciCommand::Go(_))));
        assert!(matches!(parse_uci_command("setoption name Hash value 64"),
                         Ok(UciCommand::SetOption(_))));
        assert!(matches!(parse_uci_command("perft 4"), Ok(UciCommand::Perft(4))));
        assert!(matches!(parse_uci_command("board"), Ok(UciCommand::ShowBoard)));
        assert!(parse_uci_command("xyzzy").is_err());
    }
}
