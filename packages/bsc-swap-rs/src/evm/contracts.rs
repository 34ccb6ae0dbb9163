//! PancakeSwap V2 and ERC-20 ABI definitions
//!
//! Uses alloy's sol! macro to generate call and return types. Calls are
//! encoded with `abi_encode()` and executed through `ChainRpc::call`, so the
//! bindings carry no provider.

use alloy::sol;

sol! {
    /// UniswapV2-style router (PancakeRouter)
    interface IPancakeRouter02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);

        function swapExactETHForTokensSupportingFeeOnTransferTokens(
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external payable;
    }

    interface IPancakeFactory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }

    interface IPancakePair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }

    interface IERC20 {
        function decimals() external view returns (uint8);

        function balanceOf(address account) external view returns (uint256);
    }
}
