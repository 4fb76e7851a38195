//! Top-level request handling: header validate → auth gate → procedure
//! dispatch → reply synthesis. One call to [`handle_request`] processes one
//! frame's worth of bytes and returns one frame's worth of reply bytes;
//! [`crate::server`] owns the actual socket I/O around it.

use tracing::{debug, warn};

use crate::auth::{self, AuthError};
use crate::dispatch;
use crate::error::ErrorRecord;
use crate::header::{HeaderDecodeError, MessageHeader, Status};
use crate::procedure::Procedure;
use crate::session::{ClientSession, ServerContext};
use crate::wire::{caps, Reader, Writer};

fn encode_reply(header: &MessageHeader, status: Status, body: impl FnOnce(&mut Writer)) -> Vec<u8> {
    let mut w = Writer::new();
    header.reply(status).encode(&mut w);
    body(&mut w);
    w.into_bytes()
}

fn encode_error_reply(header: &MessageHeader, error: ErrorRecord) -> Vec<u8> {
    encode_reply(header, Status::Error, |w| error.encode(w))
}

/// Process one decoded frame body and produce the reply frame body.
///
/// Never panics on malformed input: every failure path — bad header, bad
/// argument encoding, an auth-gate refusal, a handler error — is converted
/// into an `Error`-status reply rather than propagated to the caller. The
/// caller is expected to write the returned bytes back to the peer and keep
/// the connection open; only I/O-layer failures close it.
pub async fn handle_request(ctx: &ServerContext, session: &mut ClientSession, frame: &[u8]) -> Vec<u8> {
    let mut reader = Reader::new(frame);
    let header = match MessageHeader::decode(&mut reader) {
        Ok(header) => header,
        Err(err) => {
            warn!(peer = %session.peer, error = %err, "failed to decode message header");
            return encode_error_reply(&MessageHeader::fallback(), header_decode_error_record(&err));
        }
    };

    if let Err(err) = crate::header::validate_inbound(&header) {
        warn!(peer = %session.peer, error = %err, "inbound header failed validation");
        return encode_error_reply(&header, ErrorRecord::internal(err.to_string()));
    }

    let Some(proc) = Procedure::from_wire(header.proc) else {
        let proc_number = header.proc;
        warn!(peer = %session.peer, proc = proc_number, "unrecognized procedure number");
        return encode_error_reply(&header, ErrorRecord::internal(format!("unrecognized procedure {proc_number}")));
    };

    if !session.admits(proc) {
        debug!(peer = %session.peer, ?proc, "procedure rejected pre-auth");
        return encode_error_reply(&header, ErrorRecord::authentication_required());
    }

    debug!(peer = %session.peer, ?proc, serial = header.serial, "dispatching procedure");

    match proc {
        Procedure::AuthList => encode_reply(&header, Status::Ok, |w| {
            w.write_var_array(&auth::auth_list(ctx), |w, m| w.write_string(m));
        }),
        Procedure::AuthSaslInit => match auth::auth_sasl_init(ctx, session) {
            Ok(mechanisms) => encode_reply(&header, Status::Ok, |w| {
                w.write_var_array(&mechanisms, |w, m| w.write_string(m));
            }),
            Err(err) => encode_error_reply(&header, auth_error_record(err)),
        },
        Procedure::AuthSaslStart => {
            let result = (|| -> Result<Vec<u8>, ErrorRecord> {
                let mechanism = reader
                    .read_string("auth_sasl_start.mechanism", caps::STRING_MAX)
                    .map_err(|e| ErrorRecord::internal(e.to_string()))?;
                let data = reader
                    .read_option(|r| r.read_var_opaque("auth_sasl_start.data", caps::AUTH_SASL_DATA_MAX))
                    .map_err(|e| ErrorRecord::internal(e.to_string()))?;
                let reply = auth::auth_sasl_start(ctx, session, &mechanism, data.as_deref()).map_err(auth_error_record)?;
                Ok(encode_reply(&header, Status::Ok, |w| encode_sasl_reply(w, &reply)))
            })();
            result.unwrap_or_else(|err| encode_error_reply(&header, err))
        }
        Procedure::AuthSaslStep => {
            let result = (|| -> Result<Vec<u8>, ErrorRecord> {
                let data = reader
                    .read_option(|r| r.read_var_opaque("auth_sasl_step.data", caps::AUTH_SASL_DATA_MAX))
                    .map_err(|e| ErrorRecord::internal(e.to_string()))?;
                let reply = auth::auth_sasl_step(session, data.as_deref()).map_err(auth_error_record)?;
                Ok(encode_reply(&header, Status::Ok, |w| encode_sasl_reply(w, &reply)))
            })();
            result.unwrap_or_else(|err| encode_error_reply(&header, err))
        }
        other => match dispatch::dispatch(other, ctx, session, &mut reader).await {
            Ok(body) => encode_reply(&header, Status::Ok, |w| {
                let bytes = body.into_bytes();
                w.write_fixed_opaque(&bytes);
            }),
            Err(err) => {
                warn!(peer = %session.peer, ?proc, error = %err, "handler failed");
                let record = err.into_record(ctx, session).await;
                encode_error_reply(&header, record)
            }
        },
    }
}

fn encode_sasl_reply(writer: &mut Writer, reply: &auth::SaslStepReply) {
    writer.write_option(reply.data.as_ref(), |w, v| w.write_var_opaque(v));
    writer.write_bool(reply.complete);
}

fn auth_error_record(err: AuthError) -> ErrorRecord {
    match err {
        AuthError::WrongState => ErrorRecord::internal(err.to_string()),
        AuthError::Sasl(e) => ErrorRecord::internal(e.to_string()),
    }
}

fn header_decode_error_record(err: &HeaderDecodeError) -> ErrorRecord {
    ErrorRecord::internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::header::{Direction, PROGRAM, PROTOCOL_VERSION};
    use crate::sasl::PlainEngine;
    use crate::test_support::MockDriver;

    fn ctx(sasl_required: bool) -> ServerContext {
        ServerContext::new(
            Arc::new(MockDriver::new()),
            Arc::new(PlainEngine::new(vec![("alice".to_owned(), "secret".to_owned())])),
            sasl_required,
        )
    }

    fn request(proc: Procedure, body: impl FnOnce(&mut Writer)) -> Vec<u8> {
        let mut w = Writer::new();
        let header = MessageHeader {
            prog: PROGRAM,
            vers: PROTOCOL_VERSION,
            proc: proc as u32,
            direction: Direction::Call,
            status: Status::Ok,
            serial: 1,
        };
        header.encode(&mut w);
        body(&mut w);
        w.into_bytes()
    }

    fn reply_header(bytes: &[u8]) -> MessageHeader {
        let mut r = Reader::new(bytes);
        MessageHeader::decode(&mut r).unwrap()
    }

    #[tokio::test]
    async fn version_mismatch_produces_an_error_reply() {
        let ctx = ctx(false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        let mut w = Writer::new();
        MessageHeader {
            prog: PROGRAM,
            vers: PROTOCOL_VERSION + 1,
            proc: Procedure::GetType as u32,
            direction: Direction::Call,
            status: Status::Ok,
            serial: 9,
        }
        .encode(&mut w);
        let frame = w.into_bytes();
        let reply = handle_request(&ctx, &mut session, &frame).await;
        let header = reply_header(&reply);
        assert_eq!(header.status, Status::Error);
        assert_eq!(header.serial, 9);
    }

    #[tokio::test]
    async fn pre_auth_lockout_rejects_privileged_procedures() {
        let ctx = ctx(true);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), true);
        let frame = request(Procedure::DomainGetInfo, |_| {});
        let reply = handle_request(&ctx, &mut session, &frame).await;
        assert_eq!(reply_header(&reply).status, Status::Error);
    }

    #[tokio::test]
    async fn open_then_get_type_round_trips_through_the_loop() {
        let ctx = ctx(false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);

        let open_frame = request(Procedure::Open, |w| {
            w.write_string("test:///default");
            w.write_u32(0);
        });
        let open_reply = handle_request(&ctx, &mut session, &open_frame).await;
        assert_eq!(reply_header(&open_reply).status, Status::Ok);

        let frame = request(Procedure::GetType, |_| {});
        let reply = handle_request(&ctx, &mut session, &frame).await;
        let header = reply_header(&reply);
        assert_eq!(header.status, Status::Ok);
    }

    #[tokio::test]
    async fn full_sasl_negotiation_clears_the_gate_then_admits_calls() {
        let ctx = ctx(true);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), true);

        let init_frame = request(Procedure::AuthSaslInit, |_| {});
        let init_reply = handle_request(&ctx, &mut session, &init_frame).await;
        assert_eq!(reply_header(&init_reply).status, Status::Ok);

        let mut response = Vec::new();
        response.extend_from_slice(b"\0alice\0secret");
        let start_frame = request(Procedure::AuthSaslStart, |w| {
            w.write_string("PLAIN");
            w.write_option(Some(&response), |w, v| w.write_var_opaque(v));
        });
        let start_reply = handle_request(&ctx, &mut session, &start_frame).await;
        assert_eq!(reply_header(&start_reply).status, Status::Ok);

        let open_frame = request(Procedure::Open, |w| {
            w.write_string("test:///default");
            w.write_u32(0);
        });
        let open_reply = handle_request(&ctx, &mut session, &open_frame).await;
        assert_eq!(reply_header(&open_reply).status, Status::Ok);
    }
}
