use crate::amazon::{
    ProductInfo, ProductScraper, ScrapedProduct, build_affiliate_link, find_product_link,
};
use crate::models::InboundMessage;
use crate::replies;
use crate::shortener::{ShortLink, UrlShortener};
use crate::telegram::{ParseMode, TelegramClient, TelegramError};
use std::{future::Future, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallTalk {
    Greeting,
    Thanks,
    HowTo,
    AmazonMention,
    Fallback,
}

impl SmallTalk {
    pub fn reply(self) -> &'static str {
        match self {
            SmallTalk::Greeting => replies::GREETING,
            SmallTalk::Thanks => replies::THANKS,
            SmallTalk::HowTo => replies::HOW_TO,
            SmallTalk::AmazonMention => replies::AMAZON_MENTION,
            SmallTalk::Fallback => replies::FALLBACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent<'a> {
    Command(Command),
    ProductLink(&'a str),
    SmallTalk(SmallTalk),
}

impl Intent<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Command(Command::Start) => "start",
            Intent::Command(Command::Help) => "help",
            Intent::ProductLink(_) => "product_link",
            Intent::SmallTalk(SmallTalk::Fallback) => "fallback",
            Intent::SmallTalk(_) => "small_talk",
        }
    }
}

// Checked in order; the first vocabulary with a hit picks the template.
const SMALL_TALK_VOCABULARY: &[(SmallTalk, &[&str])] = &[
    (SmallTalk::Greeting, &["hello", "hi", "hey", "namaste"]),
    (SmallTalk::Thanks, &["thanks", "thank you", "shukriya"]),
    (SmallTalk::HowTo, &["how", "kaise", "kya"]),
    (SmallTalk::AmazonMention, &["amazon"]),
];

pub fn classify(text: &str) -> Intent<'_> {
    if let Some(command) = parse_command(text) {
        return Intent::Command(command);
    }
    if let Some(link) = find_product_link(text) {
        return Intent::ProductLink(link);
    }
    Intent::SmallTalk(classify_small_talk(text))
}

fn parse_command(text: &str) -> Option<Command> {
    let first = text.trim_start().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        _ => None,
    }
}

fn classify_small_talk(text: &str) -> SmallTalk {
    let lowered = text.to_lowercase();
    SMALL_TALK_VOCABULARY
        .iter()
        .find(|(_, words)| words.iter().any(|word| lowered.contains(word)))
        .map(|(kind, _)| *kind)
        .unwrap_or(SmallTalk::Fallback)
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// The chat API refused or never answered.
    Delivery,
    Internal,
}

impl PipelineError {
    pub fn delivery(stage: &'static str, err: TelegramError) -> Self {
        Self {
            stage,
            message: err.to_string(),
            kind: PipelineErrorKind::Delivery,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

/// What a handled message turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Replied { intent: &'static str },
    ProductSent { asin: String, link: ShortLink, with_photo: bool },
    ExtractionFailed,
}

/// Classifies inbound messages and drives the reply sequence. All network
/// collaborators are injected once at startup and shared across tasks.
#[derive(Clone)]
pub struct Responder {
    telegram: TelegramClient,
    scraper: ProductScraper,
    shortener: UrlShortener,
    affiliate_tag: Arc<str>,
}

impl Responder {
    pub fn new(
        telegram: TelegramClient,
        scraper: ProductScraper,
        shortener: UrlShortener,
        affiliate_tag: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            telegram,
            scraper,
            shortener,
            affiliate_tag: affiliate_tag.into(),
        }
    }

    pub fn telegram(&self) -> &TelegramClient {
        &self.telegram
    }

    /// Handles one message end to end. Errors are answered with an apology
    /// in the chat before being returned for bookkeeping.
    pub async fn handle(&self, message: &InboundMessage) -> Result<Outcome, PipelineError> {
        let intent = classify(&message.text);
        crate::metrics::inc_intent(intent.label());
        info!(
            target = "affilink.bot",
            update_id = message.update_id,
            chat_id = message.chat_id,
            sender_id = ?message.sender_id,
            message_id = message.message_id,
            sent_at = %message.timestamp,
            intent = intent.label(),
            "message received"
        );

        let result = match intent {
            Intent::Command(command) => {
                let text = match command {
                    Command::Start => replies::WELCOME,
                    Command::Help => replies::HELP,
                };
                self.reply(message.chat_id, text, intent.label()).await
            }
            Intent::SmallTalk(kind) => {
                self.reply(message.chat_id, kind.reply(), intent.label()).await
            }
            Intent::ProductLink(url) => self.handle_product_link(message.chat_id, url).await,
        };

        if let Err(err) = &result {
            error!(
                target = "affilink.bot",
                update_id = message.update_id,
                chat_id = message.chat_id,
                stage = err.stage(),
                error = %err,
                "message handling failed"
            );
            let apology = match intent {
                Intent::Command(_) => replies::COMMAND_APOLOGY,
                Intent::ProductLink(_) => replies::PRODUCT_APOLOGY,
                Intent::SmallTalk(_) => replies::SMALL_TALK_APOLOGY,
            };
            if let Err(send_err) = self.telegram.send_message(message.chat_id, apology, None).await
            {
                warn!(
                    target = "affilink.bot",
                    chat_id = message.chat_id,
                    error = %send_err,
                    "apology could not be delivered"
                );
            }
        }
        result
    }

    async fn reply(
        &self,
        chat_id: i64,
        text: &str,
        intent: &'static str,
    ) -> Result<Outcome, PipelineError> {
        self.telegram
            .send_message(chat_id, text, None)
            .await
            .map_err(|err| PipelineError::delivery("reply", err))?;
        Ok(Outcome::Replied { intent })
    }

    async fn handle_product_link(&self, chat_id: i64, url: &str) -> Result<Outcome, PipelineError> {
        let placeholder = self
            .telegram
            .send_message(chat_id, replies::PROCESSING, None)
            .await
            .map_err(|err| PipelineError::delivery("placeholder", err))?;

        let Some(ScrapedProduct { reference, info }) =
            timed("extract_product", self.scraper.extract(url)).await
        else {
            self.edit_or_send(chat_id, placeholder.message_id, replies::EXTRACTION_FAILED)
                .await?;
            return Ok(Outcome::ExtractionFailed);
        };

        let affiliate = build_affiliate_link(&reference.canonical_url, &self.affiliate_tag);
        let link = timed("shorten", self.shortener.shorten(&affiliate)).await;

        let markdown = replies::product_reply(&info, &link.url, true);
        let mut with_photo = false;
        if let Some(image) = &info.image_url {
            match self
                .telegram
                .send_photo(chat_id, image, Some(&markdown), Some(ParseMode::Markdown))
                .await
            {
                Ok(_) => with_photo = true,
                Err(err) => warn!(
                    target = "affilink.bot",
                    chat_id,
                    asin = %reference.asin,
                    error = %err,
                    "photo reply failed; falling back to text"
                ),
            }
        }

        if with_photo {
            if let Err(err) = self
                .telegram
                .delete_message(chat_id, placeholder.message_id)
                .await
            {
                warn!(target = "affilink.bot", chat_id, error = %err, "placeholder not deleted");
            }
        } else {
            self.edit_product_text(chat_id, placeholder.message_id, &info, &link, &markdown)
                .await?;
        }

        info!(
            target = "affilink.bot",
            chat_id,
            asin = %reference.asin,
            provider = link.provider,
            with_photo,
            "product reply sent"
        );
        Ok(Outcome::ProductSent {
            asin: reference.asin,
            link,
            with_photo,
        })
    }

    /// Turns the placeholder into the text-only product reply, retrying
    /// without Markdown when Telegram rejects the entities.
    async fn edit_product_text(
        &self,
        chat_id: i64,
        message_id: i64,
        info: &ProductInfo,
        link: &ShortLink,
        markdown: &str,
    ) -> Result<(), PipelineError> {
        match self
            .telegram
            .edit_message_text(chat_id, message_id, markdown, Some(ParseMode::Markdown))
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(target = "affilink.bot", chat_id, error = %err, "markdown edit rejected; retrying as plain text");
                let plain = replies::product_reply(info, &link.url, false);
                self.edit_or_send(chat_id, message_id, &plain).await
            }
        }
    }

    async fn edit_or_send(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), PipelineError> {
        let Err(err) = self
            .telegram
            .edit_message_text(chat_id, message_id, text, None)
            .await
        else {
            return Ok(());
        };
        warn!(
            target = "affilink.bot",
            chat_id,
            message_id,
            error = %err,
            "placeholder edit failed; sending a new message"
        );
        self.telegram
            .send_message(chat_id, text, None)
            .await
            .map(|_| ())
            .map_err(|err| PipelineError::delivery("product_reply", err))
    }
}

async fn timed<T, Fut>(stage: &'static str, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let started = Instant::now();
    let value = fut.await;
    crate::metrics::stage_elapsed(stage, started.elapsed().as_millis());
    value
}
