use std::io::{Read, Write};

use super::error::Error;
use super::journal::InMemoryJournal;
use super::ledger_engine::LedgerEngine;
use super::operation::{OpRecord, Operation};

/// Maps inbound operations to store and engine calls.
///
/// Reads an operations CSV, resolves each row to an account-opening or a
/// transfer, and translates outcomes: domain rejections are logged and the
/// row is skipped, malformed input is a hard error that stops the batch.
#[derive(Debug, Default)]
pub struct Dispatcher {
    engine: LedgerEngine<InMemoryJournal>,
}

impl Dispatcher {
    /// Create a new `Dispatcher` over an empty ledger
    pub fn new() -> Self {
        Self {
            engine: LedgerEngine::new(),
        }
    }

    /// Returns the underlying ledger engine
    pub fn engine(&self) -> &LedgerEngine<InMemoryJournal> {
        &self.engine
    }

    /// Primary API: Process operations from any source (File, `TcpStream`, etc.)
    /// Note that the CSV reader is buffered automatically, so you should not wrap rdr in a buffered reader like `io::BufReader`.
    pub fn process_operations<R: Read>(&mut self, reader: R) -> Result<(), Error> {
        log::info!("Starting operation processing");

        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All) // trim whitespace from fields
            .from_reader(reader);

        let mut processed = 0u64;
        let mut skipped = 0u64;

        for result in csv_reader.deserialize() {
            // Step 1: Parse CSV record into a raw dirty OpRecord
            let record: OpRecord = result?;

            let row_num = processed + skipped + 1;
            log::trace!("[row {row_num}] Parsing: {record}");

            // Step 2: Convert the raw OpRecord into a validated Operation
            let operation = Operation::try_from(record)?;

            // Step 3: Dispatch the validated Operation
            if let Err(e) = self.dispatch(operation) {
                log::warn!("[row {row_num}] - Skipped: {e}");
                skipped += 1;
            } else {
                processed += 1;
            }
        }

        log::info!(
            "Processing complete: {} processed, {} skipped, {} accounts, {} transfers",
            processed,
            skipped,
            self.engine.store().account_count(),
            self.engine.journal().len()
        );
        Ok(())
    }

    /// Secondary API: Write final account state to any sink (Stdout, File, `TcpStream`, etc.)
    /// Note that the CSV writer is buffered automatically, so you should not wrap wtr in a buffered writer like `io::BufWriter`.
    pub fn export_accounts<W: Write>(&self, writer: W) -> Result<(), Error> {
        let accounts = self.engine.store().accounts();
        log::info!("Exporting {} accounts", accounts.len());

        let mut csv_writer = csv::Writer::from_writer(writer);
        for account in accounts {
            csv_writer.serialize(account)?;
        }
        csv_writer.flush()?;

        log::trace!("Export complete");
        Ok(())
    }

    /// Write the committed transfer journal to any sink, in commit order.
    pub fn export_transfers<W: Write>(&self, writer: W) -> Result<(), Error> {
        let transfers = self.engine.journal().transfers();
        log::info!("Exporting {} transfers", transfers.len());

        let mut csv_writer = csv::Writer::from_writer(writer);
        for transfer in transfers {
            csv_writer.serialize(transfer)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Returns the number of accounts in the ledger
    pub fn account_count(&self) -> usize {
        self.engine.store().account_count()
    }

    fn dispatch(&mut self, operation: Operation) -> Result<(), DispatchError> {
        log::trace!("Dispatching: {operation}");
        match operation {
            Operation::Open(open) => {
                let account = self.engine.open_account(
                    open.owner(),
                    open.kind(),
                    open.currency(),
                    open.initial_balance(),
                )?;
                log::debug!(
                    "[open] account {} opened for user {} with balance {}",
                    account.id(),
                    account.owner(),
                    account.balance()
                );
                Ok(())
            }
            Operation::Transfer(request) => {
                let transfer = self.engine.execute_transfer(
                    request.requestor(),
                    request.source(),
                    request.destination(),
                    request.amount(),
                )?;
                log::debug!("[transfer] committed transfer {}", transfer.id());
                Ok(())
            }
        }
    }
}

/// Soft errors during dispatch. These don't stop batch processing, we log
/// and continue.
#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error(transparent)]
    Store(#[from] super::error::StoreError),
    #[error(transparent)]
    Transfer(#[from] super::error::TransferError),
}
