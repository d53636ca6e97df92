//! The composition root. One [`Sextant`] owns the connection and both
//! registries; there is no module-level state anywhere in the SDK.

use solana_address::Address;

use crate::{
    connection::Connection,
    error::{
        ClientError,
        ClientResult,
    },
    gma::GmaBuilder,
    gpa::GpaBuilder,
    operation::{
        ExecuteOptions,
        Operation,
        OperationRegistry,
        OperationTask,
    },
    programs::ProgramRegistry,
};

/// A client handle over one connection.
///
/// Registries are mutated only through [`install`](Sextant::install) and the
/// `_mut` accessors, which all require `&mut self`; the host wires plugins up
/// front, single-threaded, and dispatches read-only thereafter.
pub struct Sextant<C> {
    connection: C,
    operations: OperationRegistry<C>,
    programs: ProgramRegistry,
}

impl<C: Connection> Sextant<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            operations: OperationRegistry::new(),
            programs: ProgramRegistry::new(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn operations(&self) -> &OperationRegistry<C> {
        &self.operations
    }

    pub fn operations_mut(&mut self) -> &mut OperationRegistry<C> {
        &mut self.operations
    }

    pub fn programs(&self) -> &ProgramRegistry {
        &self.programs
    }

    pub fn programs_mut(&mut self) -> &mut ProgramRegistry {
        &mut self.programs
    }

    /// Runs a plugin's registrations against this client. Plugins installed
    /// later override earlier ones wherever they share operation keys.
    pub fn install(&mut self, plugin: impl SextantPlugin<C>) -> &mut Self {
        plugin.install(self);
        self
    }

    /// Dispatches `operation` to its registered handler.
    pub async fn execute<I, O>(
        &self,
        operation: Operation<I, O>,
        options: ExecuteOptions,
    ) -> ClientResult<O>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        self.operations.execute(operation, self, options).await
    }

    /// Resolves `operation`'s handler now; the returned task runs whenever
    /// the caller chooses.
    pub fn task<I, O>(&self, operation: Operation<I, O>) -> ClientResult<OperationTask<'_, C, I, O>> {
        self.operations.task(operation)
    }

    /// A query builder over `program`'s accounts.
    pub fn gpa(&self, program: Address) -> GpaBuilder<'_, C> {
        GpaBuilder::new(&self.connection, program)
    }

    /// A bulk fetcher over `addresses`.
    pub fn gma(&self, addresses: Vec<Address>) -> GmaBuilder<'_, C> {
        GmaBuilder::new(&self.connection, addresses)
    }

    /// Runs a failed submission through the program registry so registered
    /// programs' custom error codes come back labeled.
    pub fn resolve_program_error(&self, error: ClientError) -> ClientError {
        match error {
            ClientError::Rpc(rpc) => self.programs.resolve_error(rpc),
            other => other,
        }
    }
}

/// A vertical of operations (and the programs they talk to) that installs
/// into a client during its explicit wiring phase.
pub trait SextantPlugin<C> {
    fn install(self, client: &mut Sextant<C>);
}
