//! Static menu texts and the main keyboard.

use crate::channels::{Keyboard, OutgoingMessage, escape_html};

pub const BTN_ABOUT: &str = "🏢 About us";
pub const BTN_SERVICES: &str = "📦 Services";
pub const BTN_PRICES: &str = "💰 Prices";
pub const BTN_CONTACTS: &str = "📞 Contacts";
pub const BTN_LEAVE_REQUEST: &str = "📝 Leave a request";

/// The persistent main menu keyboard.
pub fn main_keyboard() -> Keyboard {
    Keyboard::reply(&[
        &[BTN_ABOUT, BTN_SERVICES],
        &[BTN_PRICES, BTN_CONTACTS],
        &[BTN_LEAVE_REQUEST],
    ])
}

fn with_menu(text: impl Into<String>) -> OutgoingMessage {
    OutgoingMessage::text(text).with_keyboard(main_keyboard())
}

pub fn welcome() -> OutgoingMessage {
    with_menu(
        "🚀 <b>Welcome! We help small businesses grow.</b>\n\n\
         What we do:\n\
         • 📱 Social media management (SMM)\n\
         • 🛍 Marketplace promotion\n\
         • 📊 Advertising setup\n\
         • 💰 More sales\n\n\
         Pick a section below ⤵️",
    )
}

pub fn help() -> OutgoingMessage {
    with_menu(
        "🆘 <b>Bot help</b>\n\n\
         Available commands:\n\
         /start - restart the bot\n\
         /help - this help\n\
         /price - our prices\n\
         /contact - manager contacts\n\
         /request - leave a request\n\
         /cancel - cancel the current request\n\n\
         Or use the menu buttons ⬇️",
    )
}

pub fn about() -> OutgoingMessage {
    with_menu(
        "🏢 <b>About us</b>\n\n\
         We are a team of digital marketing experts with 8 years of experience.\n\n\
         <b>Track record:</b>\n\
         • 150+ successful projects\n\
         • +45% average sales growth within 3 months\n\
         • Ad ROI from 300%\n\n\
         <b>Focus:</b>\n\
         • Instagram, VK, Telegram\n\
         • Wildberries, Ozon, Yandex Market\n\
         • Own online stores",
    )
}

pub fn services() -> OutgoingMessage {
    with_menu(
        "📦 <b>Our services:</b>\n\n\
         <u>1. Social media (SMM):</u>\n\
         • Content strategy\n\
         • Account management\n\
         • Targeted ads\n\
         • Analytics and reports\n\n\
         <u>2. Marketplaces:</u>\n\
         • Product cards\n\
         • SEO optimisation\n\
         • Review management\n\
         • Ad management\n\n\
         <u>3. Advertising setup:</u>\n\
         • Audience analysis\n\
         • Social targeting\n\
         • Search ads\n\
         • Performance analysis\n\n\
         <u>4. Full-service promotion:</u>\n\
         • The whole cycle\n\
         • Monthly reports\n\
         • A personal manager",
    )
}

pub fn prices() -> OutgoingMessage {
    with_menu(
        "💰 <b>Our prices:</b>\n\n\
         • SMM: 15-30k ₽/month\n\
         • Marketplaces: 12-25k ₽/month\n\
         • Advertising setup: 12-20k ₽/month\n\
         • Full-service: from 35k ₽/month\n\n\
         Leave a request for an exact quote.",
    )
}

pub fn contacts(manager_username: &str) -> OutgoingMessage {
    with_menu(format!(
        "📞 <b>Manager contacts:</b>\n\n\
         Telegram: {}\n\n\
         <i>We reply within 15 minutes during business hours</i>",
        escape_html(manager_username)
    ))
}

pub fn no_active_request() -> OutgoingMessage {
    with_menu("❌ There is no active request to cancel.")
}

pub fn message_received(manager_username: &str) -> OutgoingMessage {
    with_menu(format!(
        "✅ <b>Your message has been received!</b>\n\n\
         A manager will contact you shortly.\n\n\
         You can also write to them directly: {}",
        escape_html(manager_username)
    ))
}

pub fn fallback() -> OutgoingMessage {
    with_menu(
        "🤖 <b>I understand these commands:</b>\n\n\
         • /start - main menu\n\
         • /help - help\n\
         • /price - prices\n\
         • /contact - contacts\n\
         • /request - leave a request\n\n\
         Or use the menu buttons ⬆️",
    )
}
