//! Remote method names.

pub const CREATE_VIEW: &str = "createView";
pub const PROXY_GET: &str = "pv.proxy.manager.get";
pub const PROXY_UPDATE: &str = "pv.proxy.manager.update";
pub const COLOR_BY: &str = "pv.color.manager.color.by";
pub const RESCALE: &str = "pv.color.manager.rescale.transfer.function";
pub const SCALAR_BAR_VISIBILITY: &str = "pv.color.manager.scalarbar.visibility.set";
pub const VCR_ACTION: &str = "pv.vcr.action";

/// Component argument always sent with a color-by request.
pub const COLOR_COMPONENT: &str = "Magnitude";
