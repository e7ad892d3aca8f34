//! Quota usage report.

use std::io::Write;

use isi_api::{ResourceClient, SessionOpener};

use super::{Context, validate_address};
use crate::cli::SizeUnit;
use crate::error::CliError;
use crate::output::QuotaReport;

/// Quota report executor.
pub struct QuotaCommand<'a> {
    ctx: &'a Context,
}

impl<'a> QuotaCommand<'a> {
    /// Create a new quota command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Print every quota on `ip` with usage in `unit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the session is refused, or
    /// the quota query fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        ip: &str,
        unit: SizeUnit,
    ) -> Result<(), CliError> {
        validate_address(ip)?;
        let session = self.ctx.connector().open(ip).await?;
        let quotas = ResourceClient::new(&session).list_quotas().await?;
        self.ctx
            .format()
            .write(writer, &QuotaReport::new(quotas, unit))
    }
}
