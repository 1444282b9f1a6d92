use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreventivoError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("価格表が指定されていません。`--catalog FILE` を指定するか `preventivo config --add-catalog FILE` で登録してください")]
    NoCatalog,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("スプレッドシート読み込みエラー: {0}")]
    Spreadsheet(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("画像ダウンロードエラー: {0}")]
    Download(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF生成エラー: {0}")]
    PdfGeneration(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("カートが空です")]
    EmptyCart,

    #[error("入力エラー: {0}")]
    Prompt(String),

    #[error(transparent)]
    Common(#[from] preventivo_common::Error),
}

impl From<calamine::Error> for PreventivoError {
    fn from(e: calamine::Error) -> Self {
        PreventivoError::Spreadsheet(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for PreventivoError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        PreventivoError::ExcelGeneration(e.to_string())
    }
}

impl From<reqwest::Error> for PreventivoError {
    fn from(e: reqwest::Error) -> Self {
        PreventivoError::Download(e.to_string())
    }
}

impl From<dialoguer::Error> for PreventivoError {
    fn from(e: dialoguer::Error) -> Self {
        PreventivoError::Prompt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PreventivoError>;
