//! hickory-server request handler backed by the serving snapshot
//!
//! Answers every query for a managed zone and passes the rest to the next
//! handler in the chain. Nothing here holds the snapshot lock while a
//! response is being sent: `ZoneResolver::resolve` returns owned records.

use crate::resolver::{Resolution, ZoneResolver};
use crate::snapshot::ServingIndex;
use async_trait::async_trait;
use hickory_proto::op::{Edns, Header, OpCode, ResponseCode};
use hickory_proto::rr::{Name, Record};
use hickory_server::authority::{MessageResponse, MessageResponseBuilder};
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tracing::{debug, error};

/// Authoritative handler for the managed zones
#[derive(Debug, Clone)]
pub struct ZoneHandler<N = Refused> {
    resolver: ZoneResolver,
    next: N,
}

impl ZoneHandler<Refused> {
    /// Handler that refuses names outside the managed zones
    pub fn new(index: ServingIndex) -> Self {
        Self {
            resolver: ZoneResolver::new(index),
            next: Refused,
        }
    }
}

impl<N> ZoneHandler<N> {
    /// Chain `next` to handle names outside the managed zones
    pub fn with_next<M: RequestHandler>(self, next: M) -> ZoneHandler<M> {
        ZoneHandler {
            resolver: self.resolver,
            next,
        }
    }

    pub fn resolver(&self) -> &ZoneResolver {
        &self.resolver
    }
}

#[async_trait]
impl<N: RequestHandler> RequestHandler for ZoneHandler<N> {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        if request.header().op_code() != OpCode::Query {
            debug!(op_code = ?request.header().op_code(), "Unsupported opcode");
            return send_error(request, response_handle, ResponseCode::NotImp).await;
        }

        let info = match request.request_info() {
            Ok(info) => info,
            Err(e) => {
                debug!(error = %e, "Malformed request");
                return send_error(request, response_handle, ResponseCode::FormErr).await;
            }
        };
        let qname: Name = info.query.name().into();
        let qtype = info.query.query_type();

        match self.resolver.resolve(&qname, qtype) {
            Resolution::NotManaged => self.next.handle_request(request, response_handle).await,
            Resolution::ServerFailure => {
                send_error(request, response_handle, ResponseCode::ServFail).await
            }
            Resolution::Answer(response) => {
                let mut header = Header::response_from_request(request.header());
                header.set_authoritative(response.authoritative);
                header.set_response_code(response.response_code);

                let message = response_builder(request).build(
                    header,
                    response.answers.iter(),
                    response.authority.iter(),
                    std::iter::empty::<&Record>(),
                    response.additionals.iter(),
                );
                send(response_handle, message).await
            }
        }
    }
}

/// Terminal handler that answers REFUSED; this server does not recurse
#[derive(Debug, Clone, Copy, Default)]
pub struct Refused;

#[async_trait]
impl RequestHandler for Refused {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        send_error(request, response_handle, ResponseCode::Refused).await
    }
}

async fn send_error<R: ResponseHandler>(
    request: &Request,
    response_handle: R,
    code: ResponseCode,
) -> ResponseInfo {
    let message = response_builder(request).error_msg(request.header(), code);
    send(response_handle, message).await
}

/// UDP payload size advertised to EDNS clients
pub const EDNS_MAX_PAYLOAD: u16 = 1232;

/// Response builder that answers EDNS with EDNS (version 0, DO left clear)
fn response_builder(request: &Request) -> MessageResponseBuilder<'_> {
    let mut builder = MessageResponseBuilder::from_message_request(request);
    if let Some(req_edns) = request.edns() {
        let mut edns = Edns::new();
        edns.set_version(0);
        edns.set_max_payload(req_edns.max_payload().clamp(512, EDNS_MAX_PAYLOAD));
        builder.edns(edns);
    }
    builder
}

async fn send<'q, 'a, R, A, N, S, D>(
    mut response_handle: R,
    message: MessageResponse<'q, 'a, A, N, S, D>,
) -> ResponseInfo
where
    R: ResponseHandler,
    A: Iterator<Item = &'a Record> + Send + 'a,
    N: Iterator<Item = &'a Record> + Send + 'a,
    S: Iterator<Item = &'a Record> + Send + 'a,
    D: Iterator<Item = &'a Record> + Send + 'a,
{
    match response_handle.send_response(message).await {
        Ok(info) => info,
        Err(e) => {
            error!(error = %e, "Failed to send DNS response");
            let mut header = Header::new();
            header.set_response_code(ResponseCode::ServFail);
            header.into()
        }
    }
}
