//! 签名注册表
//! 扫描在读锁内克隆 Arc 得到不可变快照；修改在写锁内写时复制，进行中的扫描不受影响

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::compiler::{Signature, SignatureCatalog, SignatureCompiler};
use crate::config::ScanConfig;
use crate::error::TdResult;
use crate::rule::{SignatureDef, SignatureLoader};

/// 可在运行时增删的签名注册表
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    catalog: RwLock<Arc<SignatureCatalog>>,
}

impl SignatureRegistry {
    pub fn new(catalog: SignatureCatalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    /// 仅含内置签名库
    pub fn builtin() -> TdResult<Self> {
        Ok(Self::new(SignatureLoader::builtin()?))
    }

    /// 按配置加载（内置 + 可选外部签名库）
    pub async fn load(config: &ScanConfig) -> TdResult<Self> {
        let catalog = SignatureLoader::load(config).await?;
        info!(
            "signature registry ready: {} categories, {} signatures",
            catalog.categories().len(),
            catalog.signature_count()
        );
        Ok(Self::new(catalog))
    }

    /// 当前签名库的不可变快照
    pub fn snapshot(&self) -> Arc<SignatureCatalog> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 追加签名到其分类末尾（分类不存在则追加在分类列表末尾）
    pub fn add(&self, signature: Signature) {
        let name = signature.name().to_string();
        let category = signature.category().to_string();
        self.mutate(|catalog| catalog.push(signature));
        debug!("signature `{}` added to `{}`", name, category);
    }

    /// 先编译原始定义再追加，定义有误时注册表不变
    pub fn add_definition(&self, category: &str, definition: &SignatureDef) -> TdResult<()> {
        let signature = SignatureCompiler::compile_signature(category, definition)?;
        self.add(signature);
        Ok(())
    }

    /// 从所有分类中删除同名签名，返回删除数量；被清空的分类保留
    pub fn delete_by_name(&self, name: &str) -> usize {
        let removed = self.mutate(|catalog| catalog.remove_by_name(name));
        if removed == 0 {
            warn!("no signature named `{}` to delete", name);
        } else {
            debug!("deleted {} signature(s) named `{}`", removed, name);
        }
        removed
    }

    pub fn signature_count(&self) -> usize {
        self.snapshot().signature_count()
    }

    fn mutate<R>(&self, apply: impl FnOnce(&mut SignatureCatalog) -> R) -> R {
        let mut guard = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        apply(Arc::make_mut(&mut *guard))
    }
}
