//! ホリスティックランドマークから3Dアバターを再構成するライブラリ
//!
//! 外部の検出器プロセスが出力するポーズ・手・顔のランドマークを受け取り、
//! チューブと球による骨格ジオメトリと顔メッシュをフレームごとに更新する。
//! ジオメトリは生成一度・更新インプレースのキャッシュで管理し、
//! 時間方向の指数補間でジッタを抑える。

pub mod camera;
pub mod config;
pub mod detector;
pub mod frame;
pub mod geometry;
pub mod landmark;
pub mod overlay;
pub mod rig;
