#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Serbian,
}

impl Language {
    /// Anything that is not Serbian is served in English.
    pub fn from_tag(tag: &str) -> Self {
        if crate::speech::voice::is_serbian(tag) {
            Language::Serbian
        } else {
            Language::English
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    MealRequest,
    EmotionalExpression,
    ActivityRequest,
    GeneralCommunication,
}

impl Context {
    pub fn from_key(key: Option<&str>) -> Self {
        match key {
            Some("meal_request") => Context::MealRequest,
            Some("emotional_expression") => Context::EmotionalExpression,
            Some("activity_request") => Context::ActivityRequest,
            _ => Context::GeneralCommunication,
        }
    }
}

pub fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::English => {
            "You are an expert communication assistant for children with speech disabilities. \
             Your task is to generate natural, useful sentences that children can easily \
             understand and use. Focus on everyday communication and practical needs. \
             Sentences should be short (maximum 8 words) and easy to pronounce. \
             Respond only with sentences, each on a new line."
        }
        Language::Serbian => {
            "Ти си стручни помоћник за комуникацију за децу са потешкоћама у говору. \
             Твој задатак је да генеришеш природне, корисне реченице које деца могу лако \
             да разумеју и користе. Фокусирај се на свакодневну комуникацију и практичне \
             потребе. Реченице треба да буду кратке (максимално 8 речи) и једноставне за \
             изговор. Одговори само са реченицама, свака у новом реду."
        }
    }
}

pub fn user_prompt(cards: &str, language: Language, context: Context) -> String {
    match (language, context) {
        (Language::English, Context::MealRequest) => format!(
            "A child wants to communicate about food/eating. Using \"{cards}\", create 3 natural \
             sentences a child might say about meals, hunger, or food preferences:"
        ),
        (Language::English, Context::EmotionalExpression) => format!(
            "A child wants to express feelings about family. Using \"{cards}\", create 3 \
             sentences a child might use to share emotions with family members:"
        ),
        (Language::English, Context::ActivityRequest) => format!(
            "A child wants to communicate about activities. Using \"{cards}\", create 3 \
             sentences about what they want to do or are doing:"
        ),
        (Language::English, Context::GeneralCommunication) => format!(
            "A child is building a sentence for communication. Using \"{cards}\", create 3 \
             natural, everyday sentences a child might say:"
        ),
        (Language::Serbian, Context::MealRequest) => format!(
            "Дете жели да комуницира о храни/јелу. Користећи \"{cards}\", направи 3 природне \
             реченице које дете може рећи о оброцима, глади или преференцијама хране:"
        ),
        (Language::Serbian, Context::EmotionalExpression) => format!(
            "Дете жели да изрази осећања о породици. Користећи \"{cards}\", направи 3 реченице \
             које дете може користити да подели емоције са члановима породице:"
        ),
        (Language::Serbian, Context::ActivityRequest) => format!(
            "Дете жели да комуницира о активностима. Користећи \"{cards}\", направи 3 реченице \
             о томе шта жели да ради или шта ради:"
        ),
        (Language::Serbian, Context::GeneralCommunication) => format!(
            "Дете гради реченицу за комуникацију. Користећи \"{cards}\", направи 3 природне, \
             свакодневне реченице које дете може рећи:"
        ),
    }
}

/// Template sentences used whenever generation is unavailable or poor.
pub fn fallback_suggestions(cards: &str, language: Language) -> Vec<String> {
    match language {
        Language::Serbian => vec![
            format!("{cards} молим"),
            format!("Желим {cards}"),
            format!("{cards} је добро"),
        ],
        Language::English => vec![
            format!("I want {cards} please"),
            format!("Can I have {cards}?"),
            format!("{cards} is good"),
        ],
    }
}
