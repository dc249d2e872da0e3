//! DNS handler values, the section-merging response writer, and the
//! RCODE error handlers.

use std::sync::Arc;

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, Record, RecordType};
use thiserror::Error;

use crate::router::MatchedLeaf;

use super::middleware::ArcMiddleware;

/// A transport-backed writer commits exactly one response; a second
/// commit, or any write after it, reports this error.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("message has been written")]
pub struct WriteError;

/// An already-parsed DNS query.
#[derive(Clone, Debug)]
pub struct Request {
    pub message: Message,
}

impl Request {
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    /// Builds an internal sub-query, as issued by the zone middleware
    /// when chasing CNAME targets or resolving glue.
    pub fn question(name: Name, rtype: RecordType) -> Self {
        let mut message = Message::new();
        message.add_query(Query::query(name, rtype));
        Self { message }
    }

    pub fn query(&self) -> Option<&Query> {
        self.message.queries().first()
    }
}

/// Accumulates a response across handler and middleware layers.
///
/// Merging a message copies its id and opcode when set, keeps exactly one
/// question, ORs the header flags and appends all three record sections;
/// the response code is never merged, only set directly. This mirrors how
/// the zone middleware threads partial answers through nested writers.
///
/// Plain writers ([`ResponseWriter::new`]) are scratch buffers that merge
/// without limit. A server loop creates one transport-backed writer
/// ([`ResponseWriter::network`]) per request: it commits its response
/// exactly once through [`ResponseWriter::finish`], and a second commit
/// or any write after it is rejected with [`WriteError`].
#[derive(Clone, Debug)]
pub struct ResponseWriter {
    id: u16,
    op_code: OpCode,
    question: Option<Query>,
    answers: Vec<Record>,
    authority: Vec<Record>,
    additionals: Vec<Record>,
    response_code: ResponseCode,
    authoritative: bool,
    truncated: bool,
    recursion_desired: bool,
    recursion_available: bool,
    authentic_data: bool,
    checking_disabled: bool,
    network: bool,
    committed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            id: 0,
            op_code: OpCode::Query,
            question: None,
            answers: Vec::new(),
            authority: Vec::new(),
            additionals: Vec::new(),
            response_code: ResponseCode::NoError,
            authoritative: false,
            truncated: false,
            recursion_desired: false,
            recursion_available: false,
            authentic_data: false,
            checking_disabled: false,
            network: false,
            committed: false,
        }
    }

    /// A writer standing in for the wire: one committed response per
    /// request.
    pub fn network() -> Self {
        Self {
            network: true,
            ..Self::new()
        }
    }

    /// Appends a record to the Answer section.
    pub fn answer(&mut self, record: Record) {
        self.answers.push(record);
    }

    /// Appends a record to the Authority section.
    pub fn ns(&mut self, record: Record) {
        self.authority.push(record);
    }

    /// Appends a record to the Additional section.
    pub fn extra(&mut self, record: Record) {
        self.additionals.push(record);
    }

    pub fn answers(&self) -> &[Record] {
        &self.answers
    }

    pub fn authority(&self) -> &[Record] {
        &self.authority
    }

    pub fn additionals(&self) -> &[Record] {
        &self.additionals
    }

    pub fn response_code(&self) -> ResponseCode {
        self.response_code
    }

    pub fn set_response_code(&mut self, code: ResponseCode) {
        self.response_code = code;
    }

    pub fn authoritative(&self) -> bool {
        self.authoritative
    }

    pub fn set_authoritative(&mut self, authoritative: bool) {
        self.authoritative = authoritative;
    }

    /// Swaps the Answer and Authority sections; referrals and
    /// out-of-name SOA answers are expressed this way.
    pub fn swap_answer_authority(&mut self) {
        std::mem::swap(&mut self.answers, &mut self.authority);
    }

    /// Merges a message into the accumulated response. On a
    /// transport-backed writer whose response already went out, the write
    /// is rejected instead of merged.
    pub fn write_msg(&mut self, msg: &Message) -> Result<(), WriteError> {
        if self.network && self.committed {
            return Err(WriteError);
        }
        self.merge(msg);
        Ok(())
    }

    fn merge(&mut self, msg: &Message) {
        if msg.id() != 0 {
            self.id = msg.id();
        }
        if msg.op_code() != OpCode::Query {
            self.op_code = msg.op_code();
        }
        self.authoritative |= msg.authoritative();
        self.truncated |= msg.truncated();
        self.recursion_desired |= msg.recursion_desired();
        self.recursion_available |= msg.recursion_available();
        self.authentic_data |= msg.authentic_data();
        self.checking_disabled |= msg.checking_disabled();
        if let Some(q) = msg.queries().first() {
            self.question = Some(q.clone());
        }
        self.answers.extend(msg.answers().iter().cloned());
        self.authority.extend(msg.name_servers().iter().cloned());
        self.additionals.extend(msg.additionals().iter().cloned());
    }

    /// Whether a transport-backed response has been committed.
    pub fn committed(&self) -> bool {
        self.committed
    }

    /// Builds the accumulated response message.
    pub fn to_message(&self) -> Message {
        let mut msg = Message::new();
        msg.set_id(self.id);
        msg.set_op_code(self.op_code);
        msg.set_message_type(MessageType::Response);
        msg.set_response_code(self.response_code);
        msg.set_authoritative(self.authoritative);
        msg.set_truncated(self.truncated);
        msg.set_recursion_desired(self.recursion_desired);
        msg.set_recursion_available(self.recursion_available);
        msg.set_authentic_data(self.authentic_data);
        msg.set_checking_disabled(self.checking_disabled);
        if let Some(q) = &self.question {
            msg.add_query(q.clone());
        }
        for r in &self.answers {
            msg.add_answer(r.clone());
        }
        for r in &self.authority {
            msg.add_name_server(r.clone());
        }
        for r in &self.additionals {
            msg.add_additional(r.clone());
        }
        msg
    }

    /// Merges the originating request (id, question) and commits the
    /// final response. Safe on any serve path: queries carry no answer
    /// records. A transport-backed writer commits at most once; later
    /// calls are rejected.
    pub fn finish(&mut self, req: &Request) -> Result<Message, WriteError> {
        if self.network && self.committed {
            return Err(WriteError);
        }
        self.merge(&req.message);
        self.committed = true;
        Ok(self.to_message())
    }
}

/// A DNS query responder.
pub trait Handler: Send + Sync {
    fn serve_dns(&self, w: &mut ResponseWriter, req: &Request);
}

pub type ArcHandler = Arc<dyn Handler>;

impl<F> Handler for F
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync,
{
    fn serve_dns(&self, w: &mut ResponseWriter, req: &Request) {
        self(w, req)
    }
}

/// Runs every handler in order against the same writer.
pub struct MultiHandler(pub Vec<ArcHandler>);

impl Handler for MultiHandler {
    fn serve_dns(&self, w: &mut ResponseWriter, req: &Request) {
        for handler in &self.0 {
            handler.serve_dns(w, req);
        }
    }
}

/// Responds with a fixed RCODE, echoing the question.
#[derive(Clone, Copy, Debug)]
pub struct ErrorHandler(pub ResponseCode);

impl Handler for ErrorHandler {
    fn serve_dns(&self, w: &mut ResponseWriter, req: &Request) {
        w.set_response_code(self.0);
        let _ = w.write_msg(&req.message);
    }
}

pub const NO_ERROR: ErrorHandler = ErrorHandler(ResponseCode::NoError);
pub const NAME_ERROR: ErrorHandler = ErrorHandler(ResponseCode::NXDomain);
pub const FORMAT_ERROR: ErrorHandler = ErrorHandler(ResponseCode::FormErr);
pub const REFUSED: ErrorHandler = ErrorHandler(ResponseCode::Refused);
pub const SERVER_FAILURE: ErrorHandler = ErrorHandler(ResponseCode::ServFail);

/// Composes the final handler from matched leaves: every leaf's handlers
/// in match order, wrapped by all collected middleware so the
/// first-collected middleware sits outermost. No handlers means the
/// query is refused.
pub(crate) fn compose(matches: Vec<MatchedLeaf<ArcHandler, ArcMiddleware>>) -> ArcHandler {
    let mut handlers = Vec::new();
    let mut middleware: Vec<ArcMiddleware> = Vec::new();
    for m in &matches {
        handlers.extend(m.handlers.iter().cloned());
    }
    for m in &matches {
        middleware.extend(m.middleware.iter().cloned());
    }

    let mut handler: ArcHandler = if handlers.is_empty() {
        Arc::new(REFUSED)
    } else {
        Arc::new(MultiHandler(handlers))
    };
    for mw in middleware.iter().rev() {
        handler = mw.wrap(handler);
    }
    handler
}
