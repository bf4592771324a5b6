//! Newsletter rendering and the outgoing mail boundary.
//!
//! Rendering is pure: a subscriber, their location and the cached weather go
//! in, a subject plus plain-text and HTML bodies come out. Delivery goes
//! through the `Mailer` trait.

use async_trait::async_trait;

use crate::errors::MailError;
use crate::services::weather_cache::CachedWeatherResult;

/// Body format for the preview endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailFormat {
    Html,
    Text,
}

impl EmailFormat {
    /// Parse the `format` query value. `None` means HTML.
    pub fn parse(format: Option<&str>) -> Option<Self> {
        match format {
            None | Some("html") => Some(EmailFormat::Html),
            Some("text") | Some("txt") => Some(EmailFormat::Text),
            Some(_) => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            EmailFormat::Html => "text/html; charset=utf-8",
            EmailFormat::Text => "text/plain; charset=utf-8",
        }
    }
}

/// Everything the templates need for one recipient.
#[derive(Debug, Clone)]
pub struct NewsletterContext<'a> {
    pub email_address: &'a str,
    /// "City, ST"
    pub location: &'a str,
    pub weather: &'a CachedWeatherResult,
    pub opt_out_url: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl RenderedEmail {
    pub fn body(&self, format: EmailFormat) -> &str {
        match format {
            EmailFormat::Html => &self.html_body,
            EmailFormat::Text => &self.text_body,
        }
    }
}

/// A message ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl OutgoingEmail {
    pub fn new(from: &str, to: &str, rendered: RenderedEmail) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: rendered.subject,
            text_body: rendered.text_body,
            html_body: rendered.html_body,
        }
    }
}

/// Outgoing mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Mailer that records each message in the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            text_bytes = email.text_body.len(),
            html_bytes = email.html_body.len(),
            "Newsletter handed to log mailer"
        );
        Ok(())
    }
}

/// Opt-out link for a subscriber token.
pub fn opt_out_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/api/v1/subscribers/{}/optout",
        public_base_url.trim_end_matches('/'),
        token
    )
}

pub fn render_newsletter(ctx: &NewsletterContext<'_>) -> RenderedEmail {
    let w = ctx.weather;

    let text_body = format!(
        "{subject}\n\
         \n\
         Hi {email},\n\
         \n\
         Right now in {location} it's {temp}°F and {sky}.\n\
         \n\
         Show this email at checkout to enjoy your discount.\n\
         \n\
         --\n\
         You are receiving this because you subscribed with {email}.\n\
         Unsubscribe: {opt_out}\n",
        subject = w.subject_line,
        email = ctx.email_address,
        location = ctx.location,
        temp = w.current_temp_f,
        sky = w.sky_description,
        opt_out = ctx.opt_out_url,
    );

    let html_body = format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>{subject}</title></head>\n\
         <body class=\"disposition-{disposition}\">\n\
         <h1>{subject}</h1>\n\
         <p>Hi {email},</p>\n\
         <p><img src=\"{icon}\" alt=\"{sky}\"> Right now in {location} it's {temp}&deg;F and {sky}.</p>\n\
         <p>Show this email at checkout to enjoy your discount.</p>\n\
         <hr>\n\
         <p><small>You are receiving this because you subscribed with {email}. \
         <a href=\"{opt_out}\">Unsubscribe</a></small></p>\n\
         </body>\n\
         </html>\n",
        subject = escape_html(&w.subject_line),
        disposition = w.disposition,
        email = escape_html(ctx.email_address),
        icon = escape_html(&w.icon_display_url),
        sky = escape_html(&w.sky_description),
        location = escape_html(ctx.location),
        temp = w.current_temp_f,
        opt_out = escape_html(ctx.opt_out_url),
    );

    RenderedEmail {
        subject: w.subject_line.clone(),
        text_body,
        html_body,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
