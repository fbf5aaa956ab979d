use expectrl::{Eof, Expect};
use std::process::Command;
use std::time::Duration;

fn tally_command() -> Command {
    let bin = std::path::PathBuf::from(env!("CARGO_BIN_EXE_tally"));
    Command::new(bin)
}

#[test]
fn pty_summary_key_draws_the_frame() {
    let mut cmd = tally_command();
    cmd.arg("--quiet");
    let mut session = expectrl::Session::spawn(cmd).expect("spawn pty");
    session.set_expect_timeout(Some(Duration::from_secs(10)));

    session.send("y").expect("send y");
    session.send("s").expect("send s");
    session.expect("Tally").expect("summary frame");

    session.send("q").expect("send q");
    session.expect(Eof).expect("session exited");
}

#[test]
fn pty_ctrl_c_quits_with_a_final_summary() {
    let mut cmd = tally_command();
    cmd.arg("--quiet");
    let mut session = expectrl::Session::spawn(cmd).expect("spawn pty");
    session.set_expect_timeout(Some(Duration::from_secs(10)));

    // Wait for the child to enable raw mode; before that the PTY line
    // discipline turns 0x03 into SIGINT and kills the process.
    std::thread::sleep(Duration::from_millis(500));
    session.send("\u{3}").expect("send ctrl-c");
    session.expect("Tally").expect("final summary frame");
    session.expect(Eof).expect("session exited");
}
