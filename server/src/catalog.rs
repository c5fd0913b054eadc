//! Fixed emoji palette the game draws combos from, with human-readable names.

use shared::EmojiCombo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emoji {
    pub symbol: &'static str,
    pub name: &'static str,
}

impl Emoji {
    const fn new(symbol: &'static str, name: &'static str) -> Self {
        Self { symbol, name }
    }
}

pub const CATALOG: &[Emoji] = &[
    Emoji::new("😀", "grinning face"),
    Emoji::new("😂", "face with tears of joy"),
    Emoji::new("😍", "heart eyes"),
    Emoji::new("😎", "sunglasses face"),
    Emoji::new("🤔", "thinking face"),
    Emoji::new("😱", "screaming face"),
    Emoji::new("🥳", "partying face"),
    Emoji::new("😡", "angry face"),
    Emoji::new("😭", "crying face"),
    Emoji::new("😴", "sleeping face"),
    Emoji::new("👻", "ghost"),
    Emoji::new("🤖", "robot"),
    Emoji::new("🐶", "dog face"),
    Emoji::new("🐱", "cat face"),
    Emoji::new("🦄", "unicorn"),
    Emoji::new("🐉", "dragon"),
    Emoji::new("🍕", "pizza"),
    Emoji::new("🍔", "hamburger"),
    Emoji::new("🍟", "french fries"),
    Emoji::new("🍎", "red apple"),
    Emoji::new("🍌", "banana"),
    Emoji::new("🍉", "watermelon"),
    Emoji::new("⚽", "soccer ball"),
    Emoji::new("🏀", "basketball"),
    Emoji::new("🏈", "american football"),
    Emoji::new("🚗", "car"),
    Emoji::new("✈️", "airplane"),
    Emoji::new("🚀", "rocket"),
    Emoji::new("🌈", "rainbow"),
    Emoji::new("🔥", "fire"),
    Emoji::new("⭐", "star"),
    Emoji::new("🎲", "game die"),
    Emoji::new("🎸", "guitar"),
    Emoji::new("🎮", "video game"),
    Emoji::new("🎤", "microphone"),
    Emoji::new("🎧", "headphones"),
    Emoji::new("📚", "books"),
    Emoji::new("🧩", "puzzle piece"),
    Emoji::new("🖌️", "paintbrush"),
    Emoji::new("🎨", "artist palette"),
    Emoji::new("🏆", "trophy"),
    Emoji::new("🥇", "gold medal"),
    Emoji::new("🥈", "silver medal"),
    Emoji::new("🥉", "bronze medal"),
    Emoji::new("🎯", "bullseye"),
    Emoji::new("🎳", "bowling"),
    Emoji::new("🕹️", "joystick"),
    Emoji::new("🧸", "teddy bear"),
    Emoji::new("🎁", "wrapped gift"),
    Emoji::new("🎂", "birthday cake"),
    Emoji::new("🍰", "shortcake"),
    Emoji::new("🍩", "doughnut"),
    Emoji::new("🍪", "cookie"),
    Emoji::new("🍫", "chocolate bar"),
    Emoji::new("🍿", "popcorn"),
    Emoji::new("🍦", "soft ice cream"),
    Emoji::new("🍭", "lollipop"),
    Emoji::new("🍺", "beer mug"),
    Emoji::new("🍻", "clinking beer mugs"),
    Emoji::new("🥤", "cup with straw"),
    Emoji::new("☕", "hot beverage"),
    Emoji::new("🍵", "teacup"),
    Emoji::new("🧃", "beverage box"),
    Emoji::new("🧊", "ice cube"),
    Emoji::new("🥪", "sandwich"),
    Emoji::new("🥗", "green salad"),
    Emoji::new("🍲", "pot of food"),
    Emoji::new("🍜", "steaming bowl"),
    Emoji::new("🍣", "sushi"),
    Emoji::new("🍙", "rice ball"),
    Emoji::new("🥠", "fortune cookie"),
    Emoji::new("🦐", "shrimp"),
    Emoji::new("🦞", "lobster"),
    Emoji::new("🦀", "crab"),
    Emoji::new("🐟", "fish"),
    Emoji::new("🐬", "dolphin"),
    Emoji::new("🐋", "whale"),
    Emoji::new("🦈", "shark"),
    Emoji::new("🐊", "crocodile"),
    Emoji::new("🐢", "turtle"),
    Emoji::new("🐍", "snake"),
    Emoji::new("🦎", "lizard"),
    Emoji::new("🦖", "t-rex"),
    Emoji::new("🐅", "tiger"),
    Emoji::new("🐆", "leopard"),
    Emoji::new("🦓", "zebra"),
    Emoji::new("🦍", "gorilla"),
    Emoji::new("🐘", "elephant"),
    Emoji::new("🦛", "hippopotamus"),
    Emoji::new("🦏", "rhinoceros"),
    Emoji::new("🐪", "camel"),
    Emoji::new("🦒", "giraffe"),
    Emoji::new("🦘", "kangaroo"),
    Emoji::new("🦥", "sloth"),
    Emoji::new("🦦", "otter"),
    Emoji::new("🦨", "skunk"),
    Emoji::new("🦡", "badger"),
    Emoji::new("🐁", "mouse"),
    Emoji::new("🐀", "rat"),
    Emoji::new("🐇", "rabbit"),
    Emoji::new("🐿️", "chipmunk"),
    Emoji::new("🦔", "hedgehog"),
];

pub fn name_of(symbol: &str) -> Option<&'static str> {
    CATALOG.iter().find(|e| e.symbol == symbol).map(|e| e.name)
}

/// Readable form of a combo for logs, e.g. "rocket, pizza, crab".
pub fn describe(combo: &EmojiCombo) -> String {
    combo
        .symbols()
        .map(|s| name_of(s).unwrap_or("?"))
        .collect::<Vec<_>>()
        .join(", ")
}
