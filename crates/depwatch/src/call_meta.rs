use std::fmt;

/// Kind of RPC, as exposed in the `grpc_type` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcType {
    Unary,
    ClientStream,
    ServerStream,
    BidiStream,
}

impl RpcType {
    pub const fn as_str(self) -> &'static str {
        match self {
            RpcType::Unary => "unary",
            RpcType::ClientStream => "client_stream",
            RpcType::ServerStream => "server_stream",
            RpcType::BidiStream => "bidi_stream",
        }
    }

    pub const fn from_streaming(client_streaming: bool, server_streaming: bool) -> Self {
        match (client_streaming, server_streaming) {
            (false, false) => RpcType::Unary,
            (true, false) => RpcType::ClientStream,
            (false, true) => RpcType::ServerStream,
            (true, true) => RpcType::BidiStream,
        }
    }
}

impl fmt::Display for RpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one inbound call, carried into every metric label set.
///
/// `service` and `method` are split out of the wire form
/// `/package.Service/Method`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMeta {
    pub full_method: String,
    pub rpc_type: RpcType,
    pub service: String,
    pub method: String,
}

impl CallMeta {
    pub fn new(full_method: &str, rpc_type: RpcType) -> Self {
        let trimmed = full_method.strip_prefix('/').unwrap_or(full_method);
        let (service, method) = match trimmed.rsplit_once('/') {
            Some((service, method)) => (service, method),
            None => (trimmed, ""),
        };
        Self {
            full_method: full_method.to_string(),
            rpc_type,
            service: service.to_string(),
            method: method.to_string(),
        }
    }

    pub fn unary(full_method: &str) -> Self {
        Self::new(full_method, RpcType::Unary)
    }
}
