//! Envelope resolution and per-recipient outcome tracking.

use crate::error::{Error, Result};
use crate::types::{Address, Reply};
use courier_mime::Mail;

/// SMTP envelope: the `MAIL FROM` and `RCPT TO` addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path; `None` sends the null sender `<>`.
    ///
    /// On an explicit override `None` means "take it from the headers"
    /// unless `null_sender` is set.
    pub from: Option<Address>,
    /// Forward paths.
    pub to: Vec<Address>,
    /// Send `MAIL FROM:<>` (bounces, delivery reports).
    pub null_sender: bool,
}

impl Envelope {
    /// Creates an envelope from plain address strings.
    ///
    /// A `from` of `"<>"` requests the null sender.
    ///
    /// # Errors
    ///
    /// Returns an `EENVELOPE` error if any address is invalid.
    pub fn new<I, S>(from: Option<&str>, to: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let from = from.map(str::trim).filter(|from| !from.is_empty());
        let null_sender = from == Some("<>");
        let from = from
            .filter(|_| !null_sender)
            .map(Address::new)
            .transpose()?;
        let to = to
            .into_iter()
            .map(|addr| Address::new(addr.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            from,
            to,
            null_sender,
        })
    }

    /// Resolves the envelope for a message.
    ///
    /// Fields set on `explicit` win; the rest come from the headers: the
    /// first `From` mailbox (or `Sender`), and every `To`, `Cc` and `Bcc`
    /// mailbox with groups flattened and duplicates removed.
    ///
    /// # Errors
    ///
    /// Returns an `EENVELOPE` error if an address is invalid, no sender is
    /// known or no recipient remains. The null sender is only used when the
    /// explicit envelope asks for it.
    pub fn resolve(explicit: Option<&Self>, mail: &Mail) -> Result<Self> {
        let null_sender = explicit.is_some_and(|env| env.null_sender && env.from.is_none());
        let from = match explicit.and_then(|env| env.from.clone()) {
            Some(from) => Some(from),
            None if null_sender => None,
            None => Some(
                header_sender(mail)?
                    .ok_or_else(|| Error::envelope("No from address defined", None))?,
            ),
        };

        let to = match explicit.filter(|env| !env.to.is_empty()) {
            Some(env) => env.to.clone(),
            None => {
                let mut to: Vec<Address> = Vec::new();
                for parsed in mail.recipient_addresses() {
                    if parsed.address.is_empty() {
                        continue;
                    }
                    let address = Address::new(&parsed.address)?;
                    if !to.iter().any(|seen| seen.as_str().eq_ignore_ascii_case(address.as_str())) {
                        to.push(address);
                    }
                }
                to
            }
        };

        if to.is_empty() {
            return Err(Error::envelope("No recipients defined", None));
        }
        Ok(Self {
            from,
            to,
            null_sender,
        })
    }
}

fn header_sender(mail: &Mail) -> Result<Option<Address>> {
    let sender = mail
        .from_addresses()
        .into_iter()
        .map(|parsed| parsed.address)
        .find(|address| !address.is_empty())
        .or_else(|| {
            mail.sender
                .as_deref()
                .map(|sender| courier_mime::parse_address_list(sender, true))
                .and_then(|list| list.into_iter().map(|p| p.address).find(|a| !a.is_empty()))
        });
    sender.map(Address::new).transpose()
}

/// Where a recipient stands in the RCPT phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    /// Not yet sent.
    Pending,
    /// Accepted by `RCPT TO` (and, for LMTP, by the final reply).
    Accepted,
    /// Rejected with this reply.
    Rejected(Reply),
}

/// One recipient and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientStatus {
    /// Recipient address.
    pub address: Address,
    /// Current outcome.
    pub outcome: RecipientOutcome,
}

/// Per-recipient bookkeeping for one transaction.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    recipients: Vec<RecipientStatus>,
}

impl Delivery {
    /// Starts tracking every envelope recipient as pending.
    #[must_use]
    pub fn new(envelope: &Envelope) -> Self {
        Self {
            recipients: envelope
                .to
                .iter()
                .map(|address| RecipientStatus {
                    address: address.clone(),
                    outcome: RecipientOutcome::Pending,
                })
                .collect(),
        }
    }

    /// Records the reply to `RCPT TO` for the recipient at `index`.
    pub fn record(&mut self, index: usize, reply: &Reply) {
        if let Some(status) = self.recipients.get_mut(index) {
            status.outcome = if reply.is_success() {
                RecipientOutcome::Accepted
            } else {
                tracing::warn!(recipient = %status.address, %reply, "recipient rejected");
                RecipientOutcome::Rejected(reply.clone())
            };
        }
    }

    /// Returns every tracked recipient.
    #[must_use]
    pub fn recipients(&self) -> &[RecipientStatus] {
        &self.recipients
    }

    /// Returns the indices of accepted recipients, in envelope order.
    #[must_use]
    pub fn accepted_indices(&self) -> Vec<usize> {
        self.recipients
            .iter()
            .enumerate()
            .filter(|(_, status)| status.outcome == RecipientOutcome::Accepted)
            .map(|(index, _)| index)
            .collect()
    }

    /// Returns the number of accepted recipients.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.recipients
            .iter()
            .filter(|status| status.outcome == RecipientOutcome::Accepted)
            .count()
    }

    /// Returns accepted addresses.
    #[must_use]
    pub fn accepted(&self) -> Vec<String> {
        self.recipients
            .iter()
            .filter(|status| status.outcome == RecipientOutcome::Accepted)
            .map(|status| status.address.to_string())
            .collect()
    }

    /// Returns rejected addresses with the rejecting reply.
    #[must_use]
    pub fn rejected(&self) -> Vec<(String, Reply)> {
        self.recipients
            .iter()
            .filter_map(|status| match &status.outcome {
                RecipientOutcome::Rejected(reply) => {
                    Some((status.address.to_string(), reply.clone()))
                }
                _ => None,
            })
            .collect()
    }
}
