use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 未设置时生效）
    pub level: String,
    /// 日志格式：full|compact
    pub format: String,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_origins")]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_origins() -> Vec<String> {
        vec!["*".to_string()]
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Self::default_origins(),
        }
    }
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite 文件数据库
    #[default]
    Sqlite,
    /// 进程内存（演示/测试用，重启即丢失）
    Memory,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite 文件路径
    #[serde(default = "StorageConfig::default_sqlite_path")]
    pub sqlite_path: String,
    /// 是否启用 WAL
    #[serde(default = "StorageConfig::default_sqlite_wal")]
    pub sqlite_wal: bool,
}

impl StorageConfig {
    fn default_sqlite_path() -> String {
        "./data/fashion_marketplace.db".to_string()
    }
    fn default_sqlite_wal() -> bool {
        true
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            sqlite_path: Self::default_sqlite_path(),
            sqlite_wal: Self::default_sqlite_wal(),
        }
    }
}

/// 图片上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// 图片存放根目录
    #[serde(default = "UploadsConfig::default_dir")]
    pub dir: String,
    /// 静态访问路径前缀
    #[serde(default = "UploadsConfig::default_public_prefix")]
    pub public_prefix: String,
    /// 单个文件大小上限（字节）
    #[serde(default = "UploadsConfig::default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// 单个商品的图集数量上限
    #[serde(default = "UploadsConfig::default_max_gallery_images")]
    pub max_gallery_images: usize,
    /// 整个请求体大小上限（字节）
    #[serde(default = "UploadsConfig::default_max_request_bytes")]
    pub max_request_bytes: usize,
}

impl UploadsConfig {
    fn default_dir() -> String {
        "./uploads".to_string()
    }
    fn default_public_prefix() -> String {
        "/uploads".to_string()
    }
    fn default_max_file_bytes() -> u64 {
        10 * 1024 * 1024
    }
    fn default_max_gallery_images() -> usize {
        10
    }
    fn default_max_request_bytes() -> usize {
        // 主图 + 图集上限，外加表单字段余量
        (Self::default_max_gallery_images() + 1) * Self::default_max_file_bytes() as usize
            + 1024 * 1024
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            public_prefix: Self::default_public_prefix(),
            max_file_bytes: Self::default_max_file_bytes(),
            max_gallery_images: Self::default_max_gallery_images(),
            max_request_bytes: Self::default_max_request_bytes(),
        }
    }
}

/// 搭配推荐配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// 上装分类
    #[serde(default = "RecommendationConfig::default_top")]
    pub top_category: String,
    /// 下装分类
    #[serde(default = "RecommendationConfig::default_bottom")]
    pub bottom_category: String,
}

impl RecommendationConfig {
    fn default_top() -> String {
        "top".to_string()
    }
    fn default_bottom() -> String {
        "bottom".to_string()
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            top_category: Self::default_top(),
            bottom_category: Self::default_bottom(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 加载配置：内置默认值 <- 配置文件（可选）<- 环境变量
    ///
    /// 环境变量示例：`APP_SERVER__PORT=8080`、`APP_STORAGE__BACKEND=memory`。
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();
        let builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&AppConfig::default())?)
            .add_source(File::from(config_path).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取配置文件路径（`APP_CONFIG` 可覆盖）
    pub fn get_config_path() -> PathBuf {
        Self::config_path_from(std::env::var_os("APP_CONFIG"))
    }

    fn config_path_from(overridden: Option<std::ffi::OsString>) -> PathBuf {
        overridden
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 获取图片存放根目录
    pub fn uploads_path(&self) -> PathBuf {
        PathBuf::from(&self.uploads.dir)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "full".to_string(),
            },
            api: ApiConfig {
                prefix: "/api".to_string(),
            },
            cors: CorsConfig::default(),
            storage: StorageConfig::default(),
            uploads: UploadsConfig::default(),
            recommendation: RecommendationConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}
