//! Pre-written lines used once a conversation has degraded.
//!
//! Lines are picked by how many human turns the conversation has seen, so a
//! degraded dialogue still moves forward. The last line repeats once the
//! script runs out.

use autoimport_core::Channel;

/// Assistant lines for the customer chat: collect budget, timing, contacts.
pub const CUSTOMER_SCRIPT: &[&str] = &[
    "Отличный выбор! Подскажите, какой бюджет вы рассматриваете и из какой страны хотели бы привезти автомобиль?",
    "Понял вас. В какие сроки вы планируете покупку?",
    "Спасибо! Оставьте, пожалуйста, ваше имя и номер телефона, и менеджер свяжется с вами, чтобы подобрать лучшие варианты.",
    "Благодарю! Наш менеджер скоро свяжется с вами и ответит на все вопросы.",
];

/// Simulated-client lines for the training simulator.
pub const TRAINING_SCRIPT: &[&str] = &[
    "Ну, допустим. А какие у вас гарантии?",
    "Дороговато выходит. Почему я должен покупать через вас, а не сам?",
    "Хорошо, а сколько по времени займёт доставка и растаможка?",
    "Ладно, я подумаю. Пришлите мне всё письменно.",
];

/// Script for the replying side of `channel`.
pub fn for_channel(channel: Channel) -> &'static [&'static str] {
    match channel {
        Channel::Customer => CUSTOMER_SCRIPT,
        Channel::Training => TRAINING_SCRIPT,
    }
}
