//! Line protocol between Emacs and the classpath service.
//!
//! Emacs writes one request per line, a list whose head names the method:
//! `(qualified-names "List")`. Each request is answered with one line
//! holding the printed result, or `(error "message")` when the call failed.
//!
//! While a request is being handled the handler may call back into Emacs
//! through its [`Session`]: the call is written as
//! `(jde-juci-invoke-elisp '(function args...))` and the next input line is
//! read as the value Emacs returned.

use anyhow::{Context, Result, anyhow, bail};
use std::io::{BufRead, Write};
use tracing::{debug, error, info, trace, warn};

use crate::lisp::{self, Value};

pub const INVOKE_ELISP: &str = "jde-juci-invoke-elisp";

/// Methods callable from Emacs.
pub trait Handler {
    fn methods(&self) -> Vec<&'static str>;

    fn call(&mut self, method: &str, args: &[Value], session: &mut Session<'_>) -> Result<Value>;
}

/// Builds the Emacs function name for a method of a dotted owner name:
/// `jde.juci.Echo$Impl` + `ackAll` gives `jde-juci-echo-impl-ack-all`.
pub fn elisp_function_name(owner: &str, method: &str) -> String {
    let mut name = String::new();
    for part in owner
        .split(['.', '$'])
        .chain(std::iter::once(method))
        .filter(|p| !p.is_empty())
    {
        if !name.is_empty() {
            name.push('-');
        }
        push_kebab(&mut name, part);
    }
    name
}

fn push_kebab(out: &mut String, camel: &str) {
    let chars: Vec<char> = camel.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            out.push('-');
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            {
                out.push('-');
            }
        }
        out.extend(c.to_lowercase());
    }
}

/// The callback side of a connection, handed to handlers during a call.
pub struct Session<'a> {
    input: &'a mut dyn BufRead,
    output: &'a mut dyn Write,
    await_replies: bool,
}

impl<'a> Session<'a> {
    pub fn new(input: &'a mut dyn BufRead, output: &'a mut dyn Write, await_replies: bool) -> Self {
        Self {
            input,
            output,
            await_replies,
        }
    }

    /// Calls an Emacs function and returns what it evaluated to. Without
    /// `await_replies` the call is only written and `nil` is returned.
    pub fn invoke_elisp(&mut self, function: &str, args: Vec<Value>) -> Result<Value> {
        let mut form = Vec::with_capacity(args.len() + 1);
        form.push(Value::symbol(function));
        form.extend(args);
        let call = Value::List(vec![
            Value::symbol(INVOKE_ELISP),
            Value::quote(Value::List(form)),
        ]);

        let line = call.to_string();
        trace!("Sending callback: {}", line);
        writeln!(self.output, "{line}")?;
        self.output.flush()?;

        if !self.await_replies {
            return Ok(Value::Nil);
        }

        let Some(raw) = read_raw_line(&mut *self.input).context("Failed to read callback reply")? else {
            bail!("Connection closed while waiting for {function}");
        };
        let reply = String::from_utf8(raw)
            .with_context(|| format!("Reply to {function} is not valid UTF-8"))?;
        trace!("Callback reply: {}", reply.trim_end());
        let value = lisp::read(reply.trim()).with_context(|| format!("Invalid reply to {function}"))?;
        match error_message(&value) {
            Some(msg) => Err(anyhow!("{function} failed: {msg}")),
            None => Ok(value),
        }
    }

    /// [`Session::invoke_elisp`] with the function named after `owner` and
    /// `method` by [`elisp_function_name`].
    pub fn call_elisp(&mut self, owner: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        self.invoke_elisp(&elisp_function_name(owner, method), args)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ServeStats {
    pub requests: u64,
    pub failures: u64,
}

/// A bridge over one input/output pair, stdin/stdout in production.
pub struct Connection<R: BufRead, W: Write> {
    input: R,
    output: W,
    await_replies: bool,
}

impl<R: BufRead, W: Write> Connection<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            await_replies: true,
        }
    }

    pub fn with_await_replies(mut self, await_replies: bool) -> Self {
        self.await_replies = await_replies;
        self
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn session(&mut self) -> Session<'_> {
        Session::new(&mut self.input, &mut self.output, self.await_replies)
    }

    /// Answers requests until the input is closed.
    pub fn serve<H: Handler>(&mut self, handler: &mut H) -> Result<ServeStats> {
        info!(methods = ?handler.methods(), "bridge waiting for requests");
        let mut stats = ServeStats::default();

        loop {
            let Some(raw) = read_raw_line(&mut self.input).context("Failed to read request")? else {
                break;
            };
            let response = match String::from_utf8(raw) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.dispatch(handler, line)
                }
                Err(e) => {
                    warn!("Rejecting request: {e}");
                    error_value(&format!("Request is not valid UTF-8: {e}"))
                }
            };

            stats.requests += 1;
            if error_message(&response).is_some() {
                stats.failures += 1;
            }
            self.respond(&response)?;
        }

        info!(
            requests = stats.requests,
            failures = stats.failures,
            "bridge shutting down (input closed)"
        );
        Ok(stats)
    }

    /// Handles a single request line, writing its response. Blank lines are
    /// ignored and answer `None`.
    pub fn handle_line<H: Handler>(&mut self, handler: &mut H, line: &str) -> Result<Option<Value>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let response = self.dispatch(handler, line);
        self.respond(&response)?;
        Ok(Some(response))
    }

    fn respond(&mut self, response: &Value) -> Result<()> {
        let text = response.to_string();
        trace!("Sending: {}", text);
        writeln!(self.output, "{text}").context("Failed to write response")?;
        self.output.flush()?;
        Ok(())
    }

    fn dispatch<H: Handler>(&mut self, handler: &mut H, line: &str) -> Value {
        trace!("Received: {}", line);
        let (method, args) = match parse_request(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejecting request: {e:#}");
                return error_value(&format!("{e:#}"));
            }
        };

        debug!(method = %method, args = args.len(), "handling request");
        let mut session = self.session();
        match handler.call(&method, &args, &mut session) {
            Ok(value) => value,
            Err(e) => {
                error!(method = %method, "request failed: {e:#}");
                error_value(&format!("{e:#}"))
            }
        }
    }
}

/// Splits a request into method name and arguments. A quote around an
/// argument is dropped, as evaluating it in Emacs would.
pub fn parse_request(line: &str) -> Result<(String, Vec<Value>)> {
    let form = lisp::read(line).context("Malformed request")?;
    let Value::List(mut items) = form else {
        bail!("Request must be a list: {line}");
    };
    let head = items.remove(0);
    let Some(method) = head.as_symbol() else {
        bail!("Request must start with a method name: {line}");
    };
    let args = items
        .into_iter()
        .map(|arg| match arg {
            Value::Quoted(inner) => *inner,
            other => other,
        })
        .collect();
    Ok((method.to_string(), args))
}

/// Reads one line as raw bytes, `None` once the input is closed.
fn read_raw_line<R: BufRead + ?Sized>(input: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf))
}

pub fn error_value(message: &str) -> Value {
    Value::List(vec![Value::symbol("error"), Value::from(message)])
}

fn error_message(value: &Value) -> Option<&str> {
    match value {
        Value::List(items) if items.len() == 2 && items[0].as_symbol() == Some("error") => {
            items[1].as_str()
        }
        _ => None,
    }
}
