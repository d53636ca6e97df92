//! Registry of the ledger programs a client talks to, and resolution of
//! their custom error codes out of preflight logs.

use std::sync::Arc;

use lazy_regex::regex_captures;
use solana_address::Address;
use solana_client::{
    client_error::{
        ClientError as RpcClientError,
        ClientErrorKind,
    },
    rpc_request::{
        RpcError,
        RpcResponseErrorData,
    },
};

use crate::error::ClientError;

/// Maps a program's custom error code to a human-readable label.
pub type ErrorCodeResolver = dyn Fn(u32) -> Option<String> + Send + Sync;

#[derive(Clone)]
pub struct Program {
    pub name: String,
    pub address: Address,
    error_resolver: Option<Arc<ErrorCodeResolver>>,
}

impl Program {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            error_resolver: None,
        }
    }

    pub fn with_error_resolver(
        mut self,
        resolver: impl Fn(u32) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.error_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn resolve_error_code(&self, code: u32) -> Option<String> {
        self.error_resolver.as_ref().and_then(|resolver| resolver(code))
    }
}

/// Known programs, in registration order. Lookups prefer the latest
/// registration, mirroring the operation registry's override policy.
#[derive(Clone, Default)]
pub struct ProgramRegistry {
    programs: Vec<Program>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, program: Program) {
        self.programs.push(program);
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Program> {
        self.programs.iter().rev().find(|program| program.name == name)
    }

    pub fn get_by_address(&self, address: &Address) -> Option<&Program> {
        self.programs
            .iter()
            .rev()
            .find(|program| program.address == *address)
    }

    /// Turns a failed submission into a labeled [`ClientError::Program`] when
    /// its preflight logs name a registered program's custom error code.
    /// Anything else passes through unchanged.
    pub fn resolve_error(&self, error: RpcClientError) -> ClientError {
        let Some(logs) = preflight_logs(&error) else {
            return ClientError::Rpc(error);
        };

        match self.match_custom_error(&logs) {
            Some((program, code, label)) => ClientError::Program {
                program,
                code,
                label,
                source: Box::new(error),
            },
            None => ClientError::Rpc(error),
        }
    }

    /// Scans log lines for the first custom-program-error failure, naming the
    /// program by its registered name when known and by address otherwise.
    fn match_custom_error(&self, logs: &[String]) -> Option<(String, u32, Option<String>)> {
        for line in logs {
            let Some((address, code)) = parse_custom_error(line) else {
                continue;
            };
            let program = address
                .parse::<Address>()
                .ok()
                .and_then(|address| self.get_by_address(&address));

            return Some((
                program
                    .map(|program| program.name.clone())
                    .unwrap_or_else(|| address.to_string()),
                code,
                program.and_then(|program| program.resolve_error_code(code)),
            ));
        }
        None
    }
}

fn parse_custom_error(line: &str) -> Option<(&str, u32)> {
    let (_, address, code) = regex_captures!(
        r"Program (\w+) failed: custom program error: 0x([0-9a-fA-F]+)",
        line
    )?;
    Some((address, u32::from_str_radix(code, 16).ok()?))
}

fn preflight_logs(error: &RpcClientError) -> Option<Vec<String>> {
    match &*error.kind {
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(result),
            ..
        }) => result.logs.clone(),
        _ => None,
    }
}
