use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use anyhow::Error;

use crate::maas::{explain, CliFailure, CliRunner};

#[derive(Clone)]
enum Reply {
    Output(String),
    Failure(String),
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    queued: HashMap<String, VecDeque<Reply>>,
    standing: HashMap<String, Reply>,
}

/// Fake MAAS CLI that records every call and answers from canned replies.
///
/// Replies are keyed by `"<resource> <action>"`, e.g. `"partitions create"`.
/// One-shot replies are used first, in the order they were added, then the
/// standing reply for the command. Commands with no reply at all answer `[]`
/// for `read` actions and `{}` otherwise.
///
/// Clones share their state, so a test can hand one clone to the code under
/// test and inspect the calls through another.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    state: Rc<RefCell<State>>,
}

impl RecordingRunner {
    /// Answers the next call of `command` with `output`.
    pub fn reply(&self, command: &str, output: &str) {
        self.queue(command, Reply::Output(output.into()));
    }

    /// Answers every call of `command` with `output` once one-shot replies
    /// are used up.
    pub fn always_reply(&self, command: &str, output: &str) {
        self.state
            .borrow_mut()
            .standing
            .insert(command.into(), Reply::Output(output.into()));
    }

    /// Fails the next call of `command` the way the CLI does when the API
    /// rejects a request, with `diagnostics` as its output.
    pub fn fail(&self, command: &str, diagnostics: &str) {
        self.queue(command, Reply::Failure(diagnostics.into()));
    }

    /// Returns the calls made so far, as space-joined argument lists without
    /// the program name.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Returns the calls made so far whose resource and action match
    /// `command`.
    pub fn calls_of(&self, command: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| command_key(call.split(' ')) == command)
            .collect()
    }

    fn queue(&self, command: &str, reply: Reply) {
        self.state
            .borrow_mut()
            .queued
            .entry(command.into())
            .or_default()
            .push_back(reply);
    }
}

/// `"<resource> <action>"` of a call, skipping the profile.
fn command_key<'a>(mut args: impl Iterator<Item = &'a str>) -> String {
    args.next();
    args.take(2).collect::<Vec<_>>().join(" ")
}

impl CliRunner for RecordingRunner {
    fn run(&self, args: &[String]) -> Result<String, Error> {
        let rendered = args.join(" ");
        let key = command_key(args.iter().map(String::as_str));

        let mut state = self.state.borrow_mut();
        state.calls.push(rendered.clone());

        let queued = state.queued.get_mut(&key).and_then(VecDeque::pop_front);
        let reply = queued.or_else(|| state.standing.get(&key).cloned());

        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Failure(stdout)) => Err(CliFailure::Exit {
                command: format!("maas {rendered}"),
                code: 2,
                diagnostics: explain(&stdout, ""),
            }
            .into()),
            None if key.ends_with(" read") => Ok("[]".into()),
            None => Ok("{}".into()),
        }
    }
}
