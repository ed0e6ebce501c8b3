/// Model Variants
/// --------------

/// The base model type
pub static MODEL_TYPE: &str = "bert";

/// bert-base-chinese
pub static BASE_CHINESE: &str = "bert-base-chinese";

/// hfl/chinese-bert-wwm-ext
pub static CHINESE_BERT_WWM_EXT: &str = "hfl/chinese-bert-wwm-ext";

/// hfl/chinese-roberta-wwm-ext
pub static CHINESE_ROBERTA_WWM_EXT: &str = "hfl/chinese-roberta-wwm-ext";

/// All known BERT models on the Hugging Face Hub
pub static ALL_MODELS: &[&str; 3] = &[BASE_CHINESE, CHINESE_BERT_WWM_EXT, CHINESE_ROBERTA_WWM_EXT];

/// The default model to use for every task
pub static DEFAULT_MODEL: &str = BASE_CHINESE;
