use chrono::{Local, Timelike};
use rand::Rng;

use super::color::Tone;
use super::tony::tony_talk;

/// 時間帯に応じた挨拶を返す。
fn time_greeting(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

/// 起動時の Welcome バナーを表示する。
pub fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    let greeting = time_greeting(Local::now().hour());

    let separator = "=========================================";
    let version_line = format!(
        "   {}  ::  {} {}",
        Tone::Title.paint("TONY"),
        Tone::Speech.paint("friendly robot assistant"),
        Tone::Notice.paint(&format!("v{version}"))
    );

    println!();
    println!("{}", Tone::Frame.paint(separator));
    println!("{version_line}");
    println!("{}", Tone::Frame.paint(separator));
    println!();
    tony_talk(&format!("{greeting}! Ask me anything, or type /help."));
    println!();
}

/// 終了時の Farewell メッセージを表示する。
pub fn print_goodbye() {
    let messages: &[&str] = &[
        "Bye for now! Come back anytime.",
        "Powering down. Have a great day!",
        "See you soon. Beep boop.",
    ];

    let idx = rand::rng().random_range(0..messages.len());

    println!();
    tony_talk(messages[idx]);
    println!();
}
