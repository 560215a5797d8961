//! Well-known provider presets.

use crate::config::Security;

/// Connection preset for a mail provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    /// Canonical name.
    pub name: &'static str,
    /// Alternative names.
    pub aliases: &'static [&'static str],
    /// E-mail domains served by this provider.
    pub domains: &'static [&'static str],
    /// SMTP host.
    pub host: &'static str,
    /// SMTP port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

const fn service(
    name: &'static str,
    aliases: &'static [&'static str],
    domains: &'static [&'static str],
    host: &'static str,
    port: u16,
    security: Security,
) -> Service {
    Service {
        name,
        aliases,
        domains,
        host,
        port,
        security,
    }
}

/// Built-in provider table.
pub const SERVICES: &[Service] = &[
    service("Gmail", &["Google Mail"], &["gmail.com", "googlemail.com"], "smtp.gmail.com", 465, Security::Tls),
    service("Outlook365", &["Office365"], &[], "smtp.office365.com", 587, Security::StartTls),
    service("Hotmail", &["Outlook"], &["hotmail.com", "outlook.com", "live.com"], "smtp-mail.outlook.com", 587, Security::StartTls),
    service("Yahoo", &["Yahoo Mail"], &["yahoo.com"], "smtp.mail.yahoo.com", 465, Security::Tls),
    service("iCloud", &["Me", "Mac"], &["icloud.com", "me.com", "mac.com"], "smtp.mail.me.com", 587, Security::StartTls),
    service("Zoho", &[], &["zoho.com", "zohomail.com"], "smtp.zoho.com", 465, Security::Tls),
    service("FastMail", &[], &["fastmail.com", "fastmail.fm"], "smtp.fastmail.com", 465, Security::Tls),
    service("SendGrid", &[], &[], "smtp.sendgrid.net", 587, Security::StartTls),
    service("Mailgun", &[], &[], "smtp.mailgun.org", 465, Security::Tls),
    service("Postmark", &[], &[], "smtp.postmarkapp.com", 2525, Security::StartTls),
    service("SES", &["SES-US-EAST-1"], &[], "email-smtp.us-east-1.amazonaws.com", 465, Security::Tls),
    service("Mail.ru", &[], &[], "smtp.mail.ru", 465, Security::Tls),
    service("Yandex", &[], &["yandex.ru", "yandex.com"], "smtp.yandex.ru", 465, Security::Tls),
    service("GMX", &[], &["gmx.com", "gmx.net", "gmx.de"], "mail.gmx.com", 587, Security::StartTls),
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Looks up a preset by name, alias or e-mail domain.
///
/// Matching ignores case and punctuation, so `"Google Mail"`, `"gmail"` and
/// `"gmail.com"` all find Gmail.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static Service> {
    let wanted = normalize(name);
    if wanted.is_empty() {
        return None;
    }
    SERVICES.iter().find(|service| {
        std::iter::once(service.name)
            .chain(service.aliases.iter().copied())
            .chain(service.domains.iter().copied())
            .any(|candidate| normalize(candidate) == wanted)
    })
}
