use crate::errors::TallyError;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, TallyError>;
    fn exists(&self, path: &Path) -> bool;
}

/// The presentation seam: key capture in, lines and frames out. The
/// recorder core never touches this; the session loop owns it.
pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    /// Puts a TTY into raw mode for per-keystroke capture; no-op when
    /// stdin is piped.
    fn enter_capture(&self) -> Result<(), TallyError>;
    fn leave_capture(&self) -> Result<(), TallyError>;
    /// Blocks for the next key. `None` means end of input.
    fn read_key(&self) -> Result<Option<char>, TallyError>;
    fn write_line(&self, line: &str) -> Result<(), TallyError>;
    fn draw(&self, frame: &str) -> Result<(), TallyError>;
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, TallyError> {
        std::fs::read_to_string(path).map_err(|e| TallyError::Io(e.to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub struct ProductionTerminal {
    raw: Mutex<bool>,
}

impl ProductionTerminal {
    pub fn new() -> Self {
        Self {
            raw: Mutex::new(false),
        }
    }

    fn is_raw(&self) -> bool {
        *self.raw.lock().expect("raw flag lock")
    }

    fn read_key_raw(&self) -> Result<Option<char>, TallyError> {
        use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
        loop {
            let event = event::read().map_err(|e| TallyError::Terminal(e.to_string()))?;
            let Event::Key(key) = event else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    // Raw mode swallows SIGINT; treat Ctrl-C as quit.
                    return Ok(Some('q'));
                }
                KeyCode::Char(c) => return Ok(Some(c)),
                _ => continue,
            }
        }
    }

    fn read_key_piped(&self) -> Result<Option<char>, TallyError> {
        use std::io::Read;
        let mut byte = [0u8; 1];
        let read = std::io::stdin()
            .read(&mut byte)
            .map_err(|e| TallyError::Io(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(byte[0] as char))
    }
}

impl Default for ProductionTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn enter_capture(&self) -> Result<(), TallyError> {
        if !self.stdin_is_tty() {
            return Ok(());
        }
        crossterm::terminal::enable_raw_mode().map_err(|e| TallyError::Terminal(e.to_string()))?;
        *self.raw.lock().expect("raw flag lock") = true;
        Ok(())
    }

    fn leave_capture(&self) -> Result<(), TallyError> {
        let mut raw = self.raw.lock().expect("raw flag lock");
        if *raw {
            crossterm::terminal::disable_raw_mode()
                .map_err(|e| TallyError::Terminal(e.to_string()))?;
            *raw = false;
        }
        Ok(())
    }

    fn read_key(&self) -> Result<Option<char>, TallyError> {
        if self.is_raw() {
            self.read_key_raw()
        } else {
            self.read_key_piped()
        }
    }

    fn write_line(&self, line: &str) -> Result<(), TallyError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        // Raw mode disables the newline-to-CRLF translation.
        let result = if self.is_raw() {
            write!(out, "{line}\r\n")
        } else {
            writeln!(out, "{line}")
        };
        result.map_err(|e| TallyError::Io(e.to_string()))?;
        out.flush().map_err(|e| TallyError::Io(e.to_string()))
    }

    fn draw(&self, frame: &str) -> Result<(), TallyError> {
        for line in frame.lines() {
            self.write_line(line)?;
        }
        Ok(())
    }
}

pub struct ProductionRuntime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal::new()),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock")
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    fail_next: Arc<Mutex<Option<TallyError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert(path.into(), contents.into());
        Self {
            files: Arc::new(Mutex::new(map)),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_fail_next(&self, error: TallyError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }

    fn maybe_fail(&self) -> Result<(), TallyError> {
        if let Some(err) = self.fail_next.lock().expect("fail lock").take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, TallyError> {
        self.maybe_fail()?;
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .cloned()
            .ok_or_else(|| TallyError::Io(format!("missing file {}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    keys: Arc<Mutex<VecDeque<char>>>,
    writes: Arc<Mutex<Vec<String>>>,
    draws: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn with_keys(keys: &str) -> Self {
        Self {
            keys: Arc::new(Mutex::new(keys.chars().collect())),
            ..Self::default()
        }
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.writes.lock().expect("writes lock").clone()
    }

    pub fn drawn_frames(&self) -> Vec<String> {
        self.draws.lock().expect("draws lock").clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn enter_capture(&self) -> Result<(), TallyError> {
        Ok(())
    }

    fn leave_capture(&self) -> Result<(), TallyError> {
        Ok(())
    }

    fn read_key(&self) -> Result<Option<char>, TallyError> {
        Ok(self.keys.lock().expect("keys lock").pop_front())
    }

    fn write_line(&self, line: &str) -> Result<(), TallyError> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(line.to_string());
        Ok(())
    }

    fn draw(&self, frame: &str) -> Result<(), TallyError> {
        self.draws
            .lock()
            .expect("draws lock")
            .push(frame.to_string());
        Ok(())
    }
}
