// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
// 构建脚本: Windows MSVC 下静态 FFmpeg 需要的系统库
fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_env = std::env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();
    if target_os != "windows" || target_env != "msvc" {
        return;
    }

    // 硬件解码 (Intel QSV) + dshow 摄像头采集
    for lib in ["libmfx", "libx264", "oleaut32", "vfw32", "strmiids"] {
        println!("cargo:rustc-link-lib=dylib={}", lib);
    }
    // wss 连接用到的 Schannel
    println!("cargo:rustc-link-lib=dylib=secur32");
}
