use crate::amazon::ProductInfo;

pub const WELCOME: &str = "🛍️ Welcome to the Amazon Affiliate Bot!

I'm your shopping assistant! 😊

✨ What I can do:
• Take any Amazon product link you send me
• Pull out the product image and details
• Build an affiliate link for it
• Give you a short URL to share

📝 How to use:
Just paste an Amazon product link and I'll handle the rest!

Type /help for more information! 🚀";

pub const HELP: &str = "🔧 Help & Instructions

Supported Amazon domains:
• amazon.com
• amazon.in
• amazon.co.uk
• and the other regional Amazon stores

How to use:
1️⃣ Copy any Amazon product URL
2️⃣ Send it to me in chat
3️⃣ I'll fetch the product image & details
4️⃣ I'll generate an affiliate link
5️⃣ You get a shortened URL back

Example:
Send: https://amazon.in/dp/B08N5WRWNW
Get: Product image + affiliate link

Need more help? Just ask! 💬";

pub const GREETING: &str =
    "Hey there! 👋 I'm the Amazon affiliate bot!\nSend me any Amazon product link! 🛍️✨";

pub const THANKS: &str =
    "You're welcome! Happy to help! 😊\nSend another Amazon link whenever you need one! 🛒";

pub const HOW_TO: &str = "I'm an Amazon affiliate bot! 🤖

📝 How it works:
1. Send an Amazon product link
2. I extract the product image
3. I build the affiliate link
4. You get a shortened URL

Give it a try! 🚀";

pub const AMAZON_MENTION: &str =
    "Yes! I'm built just for Amazon! 🛍️\nSend me any Amazon product link! ⚡";

pub const FALLBACK: &str = "I only handle Amazon product links! 🛒

Send me an Amazon product link like:
• amazon.in/dp/PRODUCT_ID

and I'll reply with the image and an affiliate link! 😊";

pub const PROCESSING: &str = "🔍 Processing your link... please wait! ⏳";

pub const EXTRACTION_FAILED: &str = "😔 Sorry! I couldn't extract the product information.\nAre you sure this is a valid Amazon product link? 🤔";

pub const PRODUCT_APOLOGY: &str =
    "😞 Something went wrong on my side!\nPlease try again in a bit or send a different link. 🔧";

pub const COMMAND_APOLOGY: &str = "Sorry, something went wrong! Please try again.";

pub const SMALL_TALK_APOLOGY: &str = "Sorry, I didn't get that! Please send an Amazon link! 🤖";

/// Reply body for a resolved product. `markdown` selects legacy Telegram
/// Markdown with escaped user-controlled text; otherwise plain text.
pub fn product_reply(info: &ProductInfo, link: &str, markdown: bool) -> String {
    let esc = |text: &str| {
        if markdown {
            escape_markdown(text)
        } else {
            text.to_string()
        }
    };
    let bold = |text: &str| {
        if markdown {
            format!("*{text}*")
        } else {
            text.to_string()
        }
    };

    let mut out = format!("🛍️ {}\n\n", bold(&esc(&info.title)));
    if let Some(price) = &info.price {
        out.push_str(&format!("💰 {} {}\n\n", bold("Price:"), esc(price)));
    }
    out.push_str(&format!(
        "🔗 {}\n{}\n\n",
        bold("Here's your affiliate link:"),
        esc(link)
    ));
    out.push_str("✨ Purchases through this link support the bot. Thank you! 😊");
    out
}

/// Escapes the characters legacy Markdown treats as entity delimiters.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
